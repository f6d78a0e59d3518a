use std::fmt;

use serde::{Deserialize, Serialize};

/// Block time in whole seconds since the UNIX epoch.
///
/// The value is signed because the framework reports it that way. Negative
/// values fail [`UnixTime::validate`] and can never be encoded into a
/// range-index key: their two's-complement form would sort after every
/// positive time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct UnixTime(i64);

impl UnixTime {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Shift by a signed number of seconds, saturating at the `i64` bounds.
    pub const fn add_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Returns `true` if this time is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Returns `true` if this time is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Reject times before the epoch.
    pub fn validate(&self) -> Result<(), String> {
        if self.0 < 0 {
            return Err(format!("negative unix time {}", self.0));
        }
        Ok(())
    }

    /// Big-endian bytes for index keys. `None` for negative times.
    pub fn to_index_bytes(&self) -> Option<[u8; 8]> {
        u64::try_from(self.0).ok().map(u64::to_be_bytes)
    }
}

impl fmt::Debug for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixTime({})", self.0)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn negative_time_fails_validation() {
        assert!(UnixTime::from_secs(-1).validate().is_err());
        assert!(UnixTime::from_secs(0).validate().is_ok());
        assert!(UnixTime::from_secs(1_700_000_000).validate().is_ok());
    }

    #[test]
    fn negative_time_has_no_index_bytes() {
        assert_eq!(UnixTime::from_secs(-5).to_index_bytes(), None);
        assert_eq!(
            UnixTime::from_secs(258).to_index_bytes(),
            Some([0, 0, 0, 0, 0, 0, 1, 2])
        );
    }

    #[test]
    fn add_secs_saturates() {
        let t = UnixTime::from_secs(i64::MAX - 1);
        assert_eq!(t.add_secs(10).as_secs(), i64::MAX);
        assert_eq!(UnixTime::from_secs(100).add_secs(-40).as_secs(), 60);
    }

    #[test]
    fn ordering_helpers() {
        let a = UnixTime::from_secs(10);
        let b = UnixTime::from_secs(20);
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
        assert!(!a.is_after(&a));
    }

    proptest! {
        #[test]
        fn index_bytes_preserve_order(a in 0i64.., b in 0i64..) {
            let ka = UnixTime::from_secs(a).to_index_bytes().unwrap();
            let kb = UnixTime::from_secs(b).to_index_bytes().unwrap();
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }
    }
}
