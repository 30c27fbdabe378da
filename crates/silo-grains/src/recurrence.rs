//! Recurrences computed by memoizing grains
//!
//! TigerStyle: Pure functions, checked arithmetic, overflow is a value.

/// A recurrence `f(key)` defined by a base case and a step
///
/// `predecessor` must move strictly toward the base case, otherwise the
/// chain of nested calls never terminates (it fails with a call depth error).
pub trait Recurrence: Send + Sync + 'static {
    /// Type tag the grain is registered under
    const TYPE_TAG: &'static str;

    /// Value of `f(key)` when `key` needs no recursion
    fn base_case(key: i64) -> Option<i64>;

    /// Key whose value `f(key)` is built from
    fn predecessor(key: i64) -> i64;

    /// Combine `key` with `f(predecessor(key))`
    ///
    /// Returns `None` on arithmetic overflow.
    fn combine(key: i64, previous: i64) -> Option<i64>;
}

/// `f(k) = 1` for `k <= 1`, `f(n) = n * f(n - 1)`
///
/// Fits in an `i64` up to `f(20)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Factorial;

impl Factorial {
    /// Largest key whose factorial fits in an `i64`
    pub const KEY_MAX: i64 = 20;
}

impl Recurrence for Factorial {
    const TYPE_TAG: &'static str = "fac";

    fn base_case(key: i64) -> Option<i64> {
        (key <= 1).then_some(1)
    }

    fn predecessor(key: i64) -> i64 {
        debug_assert!(key > 1, "predecessor asked for a base case");
        key - 1
    }

    fn combine(key: i64, previous: i64) -> Option<i64> {
        key.checked_mul(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(key: i64) -> Option<i64> {
        if let Some(value) = Factorial::base_case(key) {
            return Some(value);
        }
        Factorial::combine(key, direct(Factorial::predecessor(key))?)
    }

    #[test]
    fn test_factorial_base_cases() {
        assert_eq!(Factorial::base_case(-7), Some(1));
        assert_eq!(Factorial::base_case(0), Some(1));
        assert_eq!(Factorial::base_case(1), Some(1));
        assert_eq!(Factorial::base_case(2), None);
    }

    #[test]
    fn test_factorial_values() {
        assert_eq!(direct(5), Some(120));
        assert_eq!(direct(10), Some(3_628_800));
        assert_eq!(direct(Factorial::KEY_MAX), Some(2_432_902_008_176_640_000));
    }

    #[test]
    fn test_factorial_overflow() {
        assert_eq!(direct(Factorial::KEY_MAX + 1), None);
        assert_eq!(Factorial::combine(i64::MAX, 2), None);
    }
}
