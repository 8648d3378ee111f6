use std::fmt;

use serde::{Deserialize, Serialize};

/// Eviction priority of a pool entry.
///
/// Higher values are worth more and survive longer under a priority-ordered
/// eviction policy. In a mempool this is typically the fee rate. Entries built
/// without an explicit priority carry [`Priority::MIN`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u64);

impl Priority {
    /// The lowest priority; evicted first.
    pub const MIN: Self = Self(0);
    /// The highest priority.
    pub const MAX: Self = Self(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Fee rate of `fee` spread over `size` bytes (integer division).
    ///
    /// A zero `size` yields [`Priority::MIN`].
    pub fn fee_rate(fee: u64, size: u64) -> Self {
        match fee.checked_div(size) {
            Some(rate) => Self(rate),
            None => Self::MIN,
        }
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Priority {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_min() {
        assert_eq!(Priority::default(), Priority::MIN);
    }

    #[test]
    fn fee_rate_divides() {
        assert_eq!(Priority::fee_rate(1000, 250), Priority::new(4));
        assert_eq!(Priority::fee_rate(999, 250), Priority::new(3));
    }

    #[test]
    fn fee_rate_zero_size() {
        assert_eq!(Priority::fee_rate(1000, 0), Priority::MIN);
    }

    #[test]
    fn ordering_follows_value() {
        assert!(Priority::new(1) < Priority::new(2));
        assert!(Priority::MIN < Priority::MAX);
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&Priority::new(17)).unwrap();
        assert_eq!(json, "17");
    }
}
