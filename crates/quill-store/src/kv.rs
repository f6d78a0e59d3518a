use crate::error::StoreResult;
use crate::iter::RangeIter;

/// A single write in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Ordered byte-keyed store.
///
/// This is the contract of the external store the framework hands in. Keys
/// are ordered by unsigned lexicographic comparison of their bytes.
///
/// Implementations must satisfy:
/// - Each single-key write is crash-atomic.
/// - [`KvStore::apply`] makes the whole batch visible together. The default
///   implementation applies operations in order and is only atomic if the
///   caller serializes access, which the enclosing framework does.
/// - `scan` returns entries in ascending key order.
/// - All backend failures surface as `Err`, never as missing data.
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key is absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Create or overwrite a value.
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Up to `limit` entries with `start <= key < end`, ascending.
    ///
    /// `end = None` scans to the end of the keyspace.
    fn scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Existence check without returning the value.
    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a batch of writes.
    fn apply(&self, batch: Vec<Operation>) -> StoreResult<()> {
        for op in batch {
            match op {
                Operation::Set { key, value } => self.set(&key, &value)?,
                Operation::Delete { key } => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// Lazy ascending iteration over `[start, end)`.
///
/// Pages through [`KvStore::scan`] `page_size` entries at a time.
pub fn iterate<'a>(
    store: &'a dyn KvStore,
    start: Vec<u8>,
    end: Option<Vec<u8>>,
    page_size: usize,
) -> RangeIter<'a> {
    RangeIter::new(store, start, end, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::InMemoryKvStore;

    /// Fails every write after the first.
    struct OneShot {
        inner: InMemoryKvStore,
        writes: std::sync::atomic::AtomicUsize,
    }

    impl KvStore for OneShot {
        fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
            if self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                return Err(StoreError::Backend("write refused".into()));
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &[u8]) -> StoreResult<()> {
            self.inner.delete(key)
        }

        fn scan(
            &self,
            start: &[u8],
            end: Option<&[u8]>,
            limit: usize,
        ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
            self.inner.scan(start, end, limit)
        }
    }

    #[test]
    fn operation_key() {
        assert_eq!(Operation::set(b"k".to_vec(), b"v".to_vec()).key(), b"k");
        assert_eq!(Operation::delete(b"d".to_vec()).key(), b"d");
    }

    #[test]
    fn default_apply_propagates_backend_errors() {
        let store = OneShot {
            inner: InMemoryKvStore::new(),
            writes: Default::default(),
        };
        let err = store
            .apply(vec![
                Operation::set(b"a".to_vec(), b"1".to_vec()),
                Operation::set(b"b".to_vec(), b"2".to_vec()),
            ])
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(store.has(b"a").unwrap());
        assert!(!store.has(b"b").unwrap());
    }

    #[test]
    fn iterate_walks_half_open_range() {
        let store = InMemoryKvStore::new();
        for k in [b"a", b"b", b"c", b"d", b"e"] {
            store.set(k, b"").unwrap();
        }
        let keys: Vec<Vec<u8>> = iterate(&store, b"b".to_vec(), Some(b"e".to_vec()), 2)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }
}
