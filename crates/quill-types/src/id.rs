use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width of every primary key in bytes.
pub const RECORD_ID_LEN: usize = 8;

/// Primary key of a stored record.
///
/// A `RecordId` is the big-endian encoding of a sequence value, so the
/// lexicographic order of the raw bytes equals the numeric order of the
/// sequence. Index entries append these bytes verbatim, which is what gives
/// non-unique indexes their deterministic tie-break.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId([u8; RECORD_ID_LEN]);

impl RecordId {
    /// Encode a sequence value as an ID.
    pub const fn from_sequence(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Wrap raw bytes.
    pub const fn from_raw(bytes: [u8; RECORD_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice that must be exactly 8 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; RECORD_ID_LEN] =
            bytes.try_into().map_err(|_| TypeError::InvalidLength {
                expected: RECORD_ID_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// The sequence value this ID encodes.
    pub const fn sequence(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// The raw 8 bytes.
    pub fn as_bytes(&self) -> &[u8; RECORD_ID_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 16-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.sequence())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A record that carries its own primary key.
///
/// New records have no ID; the bucket assigns one on the first put and it
/// never changes afterwards.
pub trait Identifiable {
    /// The primary key, if one has been assigned.
    fn id(&self) -> Option<RecordId>;

    /// Assign the primary key. Called by the bucket exactly once per record.
    fn set_id(&mut self, id: RecordId);
}
