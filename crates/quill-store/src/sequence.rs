use quill_types::RecordId;

use crate::bucket::validate_name;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KvStore, Operation};

const SEQUENCE_PREFIX: &[u8] = b"_s.";

/// Durable monotonic counter that hands out primary keys.
///
/// The last issued value is stored big-endian under `"_s." name`. The first
/// value issued is 1; a counter never repeats or wraps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sequence {
    name: String,
    key: Vec<u8>,
}

impl Sequence {
    pub fn new(name: &str) -> StoreResult<Self> {
        validate_name(name)?;
        let mut key = SEQUENCE_PREFIX.to_vec();
        key.extend_from_slice(name.as_bytes());
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last issued value, 0 if the counter was never used.
    pub fn current(&self, store: &dyn KvStore) -> StoreResult<u64> {
        match store.get(&self.key)? {
            None => Ok(0),
            Some(raw) => {
                let bytes: [u8; 8] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::corrupt(&self.key, "sequence value is not 8 bytes"))?;
                Ok(u64::from_be_bytes(bytes))
            }
        }
    }

    /// The next ID and the write that commits it, without writing.
    ///
    /// Callers fold the operation into their own batch so that the counter
    /// only advances when the rest of the batch is applied.
    pub fn reserve(&self, store: &dyn KvStore) -> StoreResult<(RecordId, Operation)> {
        let next = self
            .current(store)?
            .checked_add(1)
            .ok_or_else(|| StoreError::SequenceExhausted(self.name.clone()))?;
        let op = Operation::set(self.key.clone(), next.to_be_bytes().to_vec());
        Ok((RecordId::from_sequence(next), op))
    }

    /// Issue the next ID immediately.
    pub fn next(&self, store: &dyn KvStore) -> StoreResult<RecordId> {
        let (id, op) = self.reserve(store)?;
        store.apply(vec![op])?;
        Ok(id)
    }
}
