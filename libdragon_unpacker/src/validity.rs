//! The "no data" domain for raw channel values.
//!
//! Raw VME samples are stored compactly as `i16` with a reserved sentinel meaning
//! "channel not present in this buffer". Anything derived from raw samples is carried
//! as `Option<f64>` instead, so derived quantities can never be mistaken for a sentinel.
use serde::{Deserialize, Serialize};

/// A raw 16-bit channel value
pub type Sample = i16;

/// Default sentinel for a channel with no data
pub const NONE: Sample = -1;

/// Check a sample against the default sentinel
pub fn is_valid(sample: Sample) -> bool {
    sample != NONE
}

/// Check a whole array of samples against the default sentinel
pub fn all_valid(samples: &[Sample]) -> bool {
    samples.iter().all(|s| is_valid(*s))
}

/// The sentinel in use for one unpacker instance.
///
/// The sentinel is configurable, so every record carries its domain and every
/// validity check goes through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityDomain {
    pub none: Sample,
}

impl Default for ValidityDomain {
    fn default() -> Self {
        Self { none: NONE }
    }
}

impl ValidityDomain {
    pub const fn new(none: Sample) -> Self {
        Self { none }
    }

    pub fn is_valid(&self, sample: Sample) -> bool {
        sample != self.none
    }

    /// True only if every sample in the array is present. An empty array is valid.
    pub fn all_valid(&self, samples: &[Sample]) -> bool {
        samples.iter().all(|s| self.is_valid(*s))
    }

    /// Lift a raw sample to the optional representation used by derivations
    pub fn get(&self, sample: Sample) -> Option<Sample> {
        if self.is_valid(sample) {
            Some(sample)
        } else {
            None
        }
    }

    /// Lower an optional sample back to the raw representation
    pub fn store(&self, sample: Option<Sample>) -> Sample {
        sample.unwrap_or(self.none)
    }
}

/// Logical AND of validity over several samples.
///
/// `all_valid!(domain; a, b, c)` checks against the given domain and
/// `all_valid!(a, b, c)` checks against the default sentinel.
#[macro_export]
macro_rules! all_valid {
    ($domain:expr; $($sample:expr),+ $(,)?) => {{
        let domain: &$crate::validity::ValidityDomain = &$domain;
        true $(&& domain.is_valid($sample))+
    }};
    ($($sample:expr),+ $(,)?) => {
        true $(&& $crate::validity::is_valid($sample))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_validity() {
        for x in [i16::MIN, -2, -1, 0, 1, 4095, i16::MAX] {
            assert_eq!(is_valid(x), x != NONE);
        }
        let domain = ValidityDomain::new(0x7fff);
        assert!(domain.is_valid(-1));
        assert!(!domain.is_valid(0x7fff));
    }

    #[test]
    fn test_array_validity() {
        assert!(all_valid(&[0, 1, 2]));
        assert!(!all_valid(&[0, NONE, 2]));
        assert!(all_valid(&[]));
        let domain = ValidityDomain::default();
        let arr = [12, 11, -13, NONE];
        assert_eq!(
            domain.all_valid(&arr),
            arr.iter().all(|x| domain.is_valid(*x))
        );
    }

    #[test]
    fn test_variadic_validity() {
        let domain = ValidityDomain::default();
        assert!(all_valid!(domain; 1, 2, 3, 4, 5, 6, 7, 8, 9, 10));
        assert!(!all_valid!(domain; 1, 2, 3, 4, 5, 6, 7, 8, 9, NONE));
        assert!(all_valid!(3));
        assert!(!all_valid!(NONE, 3));
    }

    #[test]
    fn test_option_round_trip() {
        let domain = ValidityDomain::new(-5);
        assert_eq!(domain.get(-5), None);
        assert_eq!(domain.get(-1), Some(-1));
        assert_eq!(domain.store(None), -5);
        assert_eq!(domain.store(Some(17)), 17);
    }
}
