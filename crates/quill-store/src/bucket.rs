//! Typed record buckets with automatic secondary-index maintenance.
//!
//! ```text
//! Bucket<M>
//!     │
//!     ├── put(store, &mut record)
//!     │       1. reserve ID from the bucket sequence (if absent)
//!     │       2. record.validate()
//!     │       3. load previous version
//!     │       4. index::diff(old, new) + unique collision checks
//!     │       5. store.apply([
//!     │              Set  { sequence },
//!     │              Set  { record },
//!     │              Delete { stale index entries },
//!     │              Set  { new index entries },
//!     │          ])
//!     │
//!     └── delete(store, id)
//!             1. load record (absent → Ok(false))
//!             2. store.apply([Delete { record }, Delete { index entries }])
//! ```
//!
//! Steps 1-4 only read, so any failure before step 5 leaves the store as it
//! was.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use quill_types::{Identifiable, RecordId, Validatable};

use crate::error::{StoreError, StoreResult};
use crate::index::{self, ExtractError, Extractor, IndexSpec};
use crate::iter::{prefix_end, RangeIter, DEFAULT_PAGE_SIZE};
use crate::kv::{KvStore, Operation};
use crate::sequence::Sequence;

const MAX_NAME_LEN: usize = 32;

/// A record type that can live in a [`Bucket`].
pub trait Model:
    Identifiable + Validatable + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

impl<T> Model for T where
    T: Identifiable + Validatable + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

/// Bucket, index and counter names must be `[a-z0-9]{1,32}`.
///
/// Keeping `:`, `_` and `.` out of names is what keeps the key prefixes of
/// different buckets and indexes disjoint.
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name longer than 32 bytes"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(invalid("only lowercase ascii letters and digits allowed"));
    }
    Ok(())
}

/// A named partition of the store holding one record type.
///
/// The bucket keeps no state of its own beyond its name and index list, so
/// constructing one per use is cheap and two instances with the same name
/// see the same data.
pub struct Bucket<M> {
    name: String,
    prefix: Vec<u8>,
    sequence: Sequence,
    indexes: Vec<IndexSpec<M>>,
    page_size: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Bucket<M> {
    pub fn new(name: &str) -> StoreResult<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            prefix: format!("{name}:").into_bytes(),
            sequence: Sequence::new(name)?,
            indexes: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            _marker: PhantomData,
        })
    }

    /// Declare a secondary index.
    pub fn with_index(
        mut self,
        name: &str,
        extractor: Extractor<M>,
        unique: bool,
    ) -> StoreResult<Self> {
        validate_name(name)?;
        if self.indexes.iter().any(|spec| spec.name() == name) {
            return Err(StoreError::DuplicateIndex {
                bucket: self.name.clone(),
                index: name.to_string(),
            });
        }
        self.indexes
            .push(IndexSpec::new(&self.name, name, extractor, unique));
        Ok(self)
    }

    /// Number of index entries fetched per page by [`IndexScan`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indexes(&self) -> &[IndexSpec<M>] {
        &self.indexes
    }

    /// Store key of the record with this ID.
    pub fn record_key(&self, id: &RecordId) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn index(&self, name: &str) -> StoreResult<&IndexSpec<M>> {
        self.indexes
            .iter()
            .find(|spec| spec.name() == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                bucket: self.name.clone(),
                index: name.to_string(),
            })
    }

    fn extract_error(&self, e: ExtractError) -> StoreError {
        StoreError::InvalidIndexKey {
            bucket: self.name.clone(),
            index: e.index,
            reason: e.reason,
        }
    }

    fn decode(&self, key: &[u8], raw: &[u8], id: &RecordId) -> StoreResult<M> {
        let record: M = bincode::deserialize(raw).map_err(|e| StoreError::corrupt(key, e))?;
        if record.id() != Some(*id) {
            return Err(StoreError::corrupt(key, "stored record carries a different id"));
        }
        Ok(record)
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Insert or update a record and all of its index entries.
    ///
    /// Assigns an ID from the bucket sequence when the record has none. On
    /// success the ID is written back into `record`; on failure `record` and
    /// the store are both left untouched.
    pub fn put(&self, store: &dyn KvStore, record: &mut M) -> StoreResult<RecordId> {
        let mut ops = Vec::with_capacity(2 + self.indexes.len() * 2);
        let mut next = record.clone();
        let id = match next.id() {
            Some(id) => id,
            None => {
                let (id, bump) = self.sequence.reserve(store)?;
                ops.push(bump);
                next.set_id(id);
                id
            }
        };
        next.validate()?;

        let key = self.record_key(&id);
        let old = match store.get(&key)? {
            Some(raw) => Some(self.decode(&key, &raw, &id)?),
            None => None,
        };
        let deltas = index::diff(&self.indexes, old.as_ref(), Some(&next))
            .map_err(|e| self.extract_error(e))?;

        let value = bincode::serialize(&next).map_err(|e| StoreError::Serialization(e.to_string()))?;
        ops.push(Operation::set(key, value));

        for delta in &deltas {
            if let Some(old_key) = &delta.old_key {
                let spec = &self.indexes[delta.index];
                ops.push(Operation::delete(spec.storage_key(old_key, &id)));
            }
        }
        for delta in &deltas {
            if let Some(new_key) = &delta.new_key {
                let spec = &self.indexes[delta.index];
                let entry = spec.storage_key(new_key, &id);
                if spec.is_unique() {
                    self.check_unique(store, spec, &entry, new_key, &id)?;
                }
                ops.push(Operation::set(entry, id.as_bytes().to_vec()));
            }
        }

        store.apply(ops)?;
        debug!(
            bucket = %self.name,
            id = id.sequence(),
            created = old.is_none(),
            index_changes = deltas.len(),
            "record stored"
        );
        record.set_id(id);
        Ok(id)
    }

    fn check_unique(
        &self,
        store: &dyn KvStore,
        spec: &IndexSpec<M>,
        entry: &[u8],
        key: &[u8],
        id: &RecordId,
    ) -> StoreResult<()> {
        if let Some(raw) = store.get(entry)? {
            let owner = RecordId::from_slice(&raw).map_err(|e| StoreError::corrupt(entry, e))?;
            if owner != *id {
                return Err(StoreError::Conflict {
                    bucket: self.name.clone(),
                    index: spec.name().to_string(),
                    key: hex::encode(key),
                });
            }
        }
        Ok(())
    }

    /// Remove a record and every index entry derived from it.
    ///
    /// Returns `Ok(false)` when there was nothing to delete; that is a
    /// success, not an error.
    pub fn delete(&self, store: &dyn KvStore, id: &RecordId) -> StoreResult<bool> {
        let key = self.record_key(id);
        let Some(raw) = store.get(&key)? else {
            return Ok(false);
        };
        let old = self.decode(&key, &raw, id)?;
        let deltas =
            index::diff(&self.indexes, Some(&old), None).map_err(|e| self.extract_error(e))?;

        let mut ops = Vec::with_capacity(1 + deltas.len());
        ops.push(Operation::delete(key));
        for delta in &deltas {
            if let Some(old_key) = &delta.old_key {
                let spec = &self.indexes[delta.index];
                ops.push(Operation::delete(spec.storage_key(old_key, id)));
            }
        }
        store.apply(ops)?;
        debug!(bucket = %self.name, id = id.sequence(), "record deleted");
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// The record with this ID, or `None`.
    pub fn get(&self, store: &dyn KvStore, id: &RecordId) -> StoreResult<Option<M>> {
        let key = self.record_key(id);
        match store.get(&key)? {
            Some(raw) => self.decode(&key, &raw, id).map(Some),
            None => Ok(None),
        }
    }

    /// The record with this ID; [`StoreError::NotFound`] if absent.
    pub fn one(&self, store: &dyn KvStore, id: &RecordId) -> StoreResult<M> {
        self.get(store, id)?.ok_or_else(|| StoreError::NotFound {
            bucket: self.name.clone(),
            id: *id,
        })
    }

    /// Whether a record with this ID exists. Does not decode it.
    pub fn has(&self, store: &dyn KvStore, id: &RecordId) -> StoreResult<bool> {
        store.has(&self.record_key(id))
    }

    /// IDs whose extracted key equals `key`, ordered by ID.
    pub fn query<'a>(
        &self,
        store: &'a dyn KvStore,
        index: &str,
        key: &[u8],
    ) -> StoreResult<IndexScan<'a>> {
        let spec = self.index(index)?;
        let bound = spec.bound_key(key);
        let exact_len = if spec.is_unique() {
            bound.len()
        } else {
            bound.len() + quill_types::id::RECORD_ID_LEN
        };
        let iter = RangeIter::prefix(store, &bound, self.page_size);
        Ok(IndexScan::new(iter, Some(exact_len)))
    }

    /// IDs whose extracted key lies in `[start, end)`, ordered by raw index
    /// key bytes. `end = None` scans to the end of the index.
    ///
    /// Bounds compare against extracted keys; this is exact for indexes whose
    /// keys all have the same width.
    pub fn query_range<'a>(
        &self,
        store: &'a dyn KvStore,
        index: &str,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> StoreResult<IndexScan<'a>> {
        let spec = self.index(index)?;
        let upper = match end {
            Some(end) => Some(spec.bound_key(end)),
            None => prefix_end(spec.prefix()),
        };
        let iter = RangeIter::new(store, spec.bound_key(start), upper, self.page_size);
        Ok(IndexScan::new(iter, None))
    }

    /// IDs whose extracted key starts with `prefix`.
    pub fn query_prefix<'a>(
        &self,
        store: &'a dyn KvStore,
        index: &str,
        prefix: &[u8],
    ) -> StoreResult<IndexScan<'a>> {
        let spec = self.index(index)?;
        let iter = RangeIter::prefix(store, &spec.bound_key(prefix), self.page_size);
        Ok(IndexScan::new(iter, None))
    }

    /// The single record a unique index maps `key` to, if any.
    pub fn one_by_unique(
        &self,
        store: &dyn KvStore,
        index: &str,
        key: &[u8],
    ) -> StoreResult<Option<M>> {
        let mut scan = self.query(store, index, key)?;
        match scan.next() {
            Some(id) => self.get(store, &id?),
            None => Ok(None),
        }
    }

    /// Resolve every ID of a scan into its record.
    ///
    /// An index entry pointing at a missing record is reported as
    /// [`StoreError::Corrupt`].
    pub fn load(&self, store: &dyn KvStore, scan: IndexScan<'_>) -> StoreResult<Vec<M>> {
        scan.map(|id| {
            let id = id?;
            self.get(store, &id)?.ok_or_else(|| {
                StoreError::corrupt(&self.record_key(&id), "index entry without record")
            })
        })
        .collect()
    }
}

impl<M> std::fmt::Debug for Bucket<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("indexes", &self.indexes)
            .finish()
    }
}

/// Lazy, ordered sequence of IDs from one index.
///
/// Holds only the resume key between pages; call the query again to restart.
pub struct IndexScan<'a> {
    entries: RangeIter<'a>,
    exact_len: Option<usize>,
}

impl<'a> IndexScan<'a> {
    fn new(entries: RangeIter<'a>, exact_len: Option<usize>) -> Self {
        Self { entries, exact_len }
    }

    /// Drain the scan into a vector of IDs.
    pub fn ids(self) -> StoreResult<Vec<RecordId>> {
        self.collect()
    }
}

impl Iterator for IndexScan<'_> {
    type Item = StoreResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            // A prefix scan for key `k` also sees longer keys that start
            // with `k`; exact lookups skip them.
            if self.exact_len.is_some_and(|len| key.len() != len) {
                continue;
            }
            return Some(RecordId::from_slice(&value).map_err(|e| StoreError::corrupt(&key, e)));
        }
    }
}

impl std::fmt::Debug for IndexScan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexScan")
            .field("entries", &self.entries)
            .field("exact_len", &self.exact_len)
            .finish()
    }
}
