//! Declarative secondary indexes and the pure diff between record versions.
//!
//! An index is a plain function from a record to an optional key. The bucket
//! never asks an index to mutate anything; it asks [`diff`] which keys
//! changed between the stored version and the new one and turns the answer
//! into store operations.

use quill_types::RecordId;

/// Extracts an index key from a record.
///
/// - `Ok(Some(key))`: index the record under `key`.
/// - `Ok(None)`: do not index this record.
/// - `Err(reason)`: the record cannot be indexed; the write is aborted.
pub type Extractor<M> = fn(&M) -> Result<Option<Vec<u8>>, String>;

/// One declared index of a bucket.
pub struct IndexSpec<M> {
    name: String,
    extractor: Extractor<M>,
    unique: bool,
    prefix: Vec<u8>,
}

impl<M> IndexSpec<M> {
    pub(crate) fn new(bucket: &str, name: &str, extractor: Extractor<M>, unique: bool) -> Self {
        Self {
            name: name.to_string(),
            extractor,
            unique,
            prefix: format!("_i.{bucket}_{name}:").into_bytes(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Key prefix shared by every entry of this index.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn extract(&self, record: &M) -> Result<Option<Vec<u8>>, String> {
        (self.extractor)(record)
    }

    /// Store key for an index entry.
    ///
    /// Unique indexes store `prefix || key`; non-unique indexes append the
    /// primary key so entries sharing `key` stay distinct and sort by ID.
    pub fn storage_key(&self, key: &[u8], id: &RecordId) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len() + 8);
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        if !self.unique {
            out.extend_from_slice(id.as_bytes());
        }
        out
    }

    /// Store key for a bound in range queries over extracted keys.
    pub fn bound_key(&self, key: &[u8]) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend_from_slice(key);
        out
    }
}

impl<M> Clone for IndexSpec<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            extractor: self.extractor,
            unique: self.unique,
            prefix: self.prefix.clone(),
        }
    }
}

impl<M> std::fmt::Debug for IndexSpec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSpec")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .finish()
    }
}

/// A changed index key for one declared index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDelta {
    /// Position of the index in the bucket's declaration list.
    pub index: usize,
    /// Key derived from the stored version, if it was indexed.
    pub old_key: Option<Vec<u8>>,
    /// Key derived from the new version, if it will be indexed.
    pub new_key: Option<Vec<u8>>,
}

/// Failure of one extractor during [`diff`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractError {
    pub index: String,
    pub reason: String,
}

/// Index keys that change between `old` and `new`.
///
/// `old = None` is a create, `new = None` a delete. Indexes whose key is the
/// same in both versions produce no delta.
pub fn diff<M>(
    indexes: &[IndexSpec<M>],
    old: Option<&M>,
    new: Option<&M>,
) -> Result<Vec<IndexDelta>, ExtractError> {
    let mut deltas = Vec::new();
    for (position, spec) in indexes.iter().enumerate() {
        let extract = |record: Option<&M>| -> Result<Option<Vec<u8>>, ExtractError> {
            match record {
                None => Ok(None),
                Some(r) => spec.extract(r).map_err(|reason| ExtractError {
                    index: spec.name.clone(),
                    reason,
                }),
            }
        };
        let old_key = extract(old)?;
        let new_key = extract(new)?;
        if old_key != new_key {
            deltas.push(IndexDelta {
                index: position,
                old_key,
                new_key,
            });
        }
    }
    Ok(deltas)
}
