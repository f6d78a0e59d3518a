//! Write overlay that turns one logical operation into one batch.
//!
//! A [`StagedStore`] buffers every write made through it and serves reads
//! from the buffer first (read-your-writes), falling back to the base store.
//! Nothing reaches the base store until [`StagedStore::commit`], which hands
//! the whole buffer to [`KvStore::apply`] in one call. Dropping the overlay
//! discards it.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvStore, Operation};

/// `Some(value)` for a pending write, `None` for a pending delete.
type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

pub struct StagedStore<'a> {
    base: &'a dyn KvStore,
    writes: RwLock<WriteSet>,
}

impl<'a> StagedStore<'a> {
    pub fn new(base: &'a dyn KvStore) -> Self {
        Self {
            base,
            writes: RwLock::new(BTreeMap::new()),
        }
    }

    fn read_set(&self) -> StoreResult<RwLockReadGuard<'_, WriteSet>> {
        self.writes
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_set(&self) -> StoreResult<RwLockWriteGuard<'_, WriteSet>> {
        self.writes
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    /// Number of keys with a pending write or delete.
    pub fn pending(&self) -> StoreResult<usize> {
        Ok(self.read_set()?.len())
    }

    /// The buffered writes as a batch, in key order.
    pub fn operations(&self) -> StoreResult<Vec<Operation>> {
        Ok(self
            .read_set()?
            .iter()
            .map(|(k, v)| match v {
                Some(value) => Operation::set(k.clone(), value.clone()),
                None => Operation::delete(k.clone()),
            })
            .collect())
    }

    /// Apply every buffered write to the base store as one batch.
    pub fn commit(self) -> StoreResult<()> {
        let writes = self
            .writes
            .into_inner()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        if writes.is_empty() {
            return Ok(());
        }
        let batch: Vec<Operation> = writes
            .into_iter()
            .map(|(k, v)| match v {
                Some(value) => Operation::Set { key: k, value },
                None => Operation::Delete { key: k },
            })
            .collect();
        debug!(ops = batch.len(), "staged batch committed");
        self.base.apply(batch)
    }
}

impl KvStore for StagedStore<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.read_set()?.get(key) {
            return Ok(pending.clone());
        }
        self.base.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.write_set()?.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.write_set()?.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let upper = match end {
            Some(end) if end <= start => return Ok(Vec::new()),
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let overlay: Vec<(Vec<u8>, Option<Vec<u8>>)> = self
            .read_set()?
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // Each pending delete can hide at most one base entry, so fetching
        // `limit + overlay.len()` base entries always covers the first
        // `limit` merged entries.
        let base = self
            .base
            .scan(start, end, limit.saturating_add(overlay.len()))?;
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = base.into_iter().collect();
        for (key, pending) in overlay {
            match pending {
                Some(value) => {
                    merged.insert(key, value);
                }
                None => {
                    merged.remove(&key);
                }
            }
        }
        Ok(merged.into_iter().take(limit).collect())
    }

    fn apply(&self, batch: Vec<Operation>) -> StoreResult<()> {
        let mut writes = self.write_set()?;
        for op in batch {
            match op {
                Operation::Set { key, value } => {
                    writes.insert(key, Some(value));
                }
                Operation::Delete { key } => {
                    writes.insert(key, None);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StagedStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending().unwrap_or_default();
        f.debug_struct("StagedStore")
            .field("pending", &pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::RangeIter;
    use crate::memory::InMemoryKvStore;

    #[test]
    fn writes_are_invisible_until_commit() {
        let base = InMemoryKvStore::new();
        let staged = StagedStore::new(&base);
        staged.set(b"k", b"v").unwrap();

        assert_eq!(staged.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(base.get(b"k").unwrap().is_none());

        staged.commit().unwrap();
        assert_eq!(base.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn drop_discards_writes() {
        let base = InMemoryKvStore::new();
        base.set(b"keep", b"1").unwrap();
        {
            let staged = StagedStore::new(&base);
            staged.delete(b"keep").unwrap();
            staged.set(b"new", b"2").unwrap();
            assert!(staged.get(b"keep").unwrap().is_none());
        }
        assert_eq!(base.get(b"keep").unwrap(), Some(b"1".to_vec()));
        assert!(base.get(b"new").unwrap().is_none());
    }

    #[test]
    fn scan_merges_overlay_and_base() {
        let base = InMemoryKvStore::new();
        for k in [b"a", b"b", b"c", b"d"] {
            base.set(k, b"base").unwrap();
        }
        let staged = StagedStore::new(&base);
        staged.delete(b"a").unwrap();
        staged.delete(b"b").unwrap();
        staged.set(b"bb", b"staged").unwrap();
        staged.set(b"c", b"over").unwrap();

        let page = staged.scan(b"", None, 3).unwrap();
        let keys: Vec<&[u8]> = page.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![&b"bb"[..], &b"c"[..], &b"d"[..]]);
        assert_eq!(page[1].1, b"over".to_vec());
    }

    #[test]
    fn paging_iterator_over_overlay() {
        let base = InMemoryKvStore::new();
        for i in 0u8..6 {
            base.set(&[b'p', i], b"").unwrap();
        }
        let staged = StagedStore::new(&base);
        staged.delete(&[b'p', 1]).unwrap();
        staged.delete(&[b'p', 2]).unwrap();
        staged.set(&[b'p', 9], b"").unwrap();

        let keys: Vec<Vec<u8>> = RangeIter::prefix(&staged, b"p", 2)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(
            keys,
            vec![
                vec![b'p', 0],
                vec![b'p', 3],
                vec![b'p', 4],
                vec![b'p', 5],
                vec![b'p', 9]
            ]
        );
    }

    #[test]
    fn last_write_wins_within_overlay() {
        let base = InMemoryKvStore::new();
        let staged = StagedStore::new(&base);
        staged.set(b"k", b"1").unwrap();
        staged.delete(b"k").unwrap();
        staged.set(b"k", b"3").unwrap();
        assert_eq!(staged.pending().unwrap(), 1);
        staged.commit().unwrap();
        assert_eq!(base.get(b"k").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn nested_overlays_commit_inward() {
        let base = InMemoryKvStore::new();
        let outer = StagedStore::new(&base);
        {
            let inner = StagedStore::new(&outer);
            inner.set(b"k", b"v").unwrap();
            inner.commit().unwrap();
        }
        assert!(base.get(b"k").unwrap().is_none());
        outer.commit().unwrap();
        assert_eq!(base.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn empty_commit_is_noop() {
        let base = InMemoryKvStore::new();
        StagedStore::new(&base).commit().unwrap();
        assert!(base.is_empty().unwrap());
    }
}
