//! Pluggable key comparison.
//!
//! Equality joins need both hashing and equality over keys, so
//! `KeyEquality` exposes both and implementations must keep them consistent:
//! keys that compare equal must hash to the same value. Ordered merges only
//! need a total order via `KeyOrdering`.

use std::cmp::Ordering;
use std::hash::Hash;
use std::marker::PhantomData;

use ahash::RandomState;

/// State used for all key hashing.
pub const HASH_RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

pub trait KeyEquality<K: ?Sized> {
    fn hash_key(&self, key: &K) -> u64;
    fn keys_equal(&self, a: &K, b: &K) -> bool;
}

/// Natural equality of the key type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultEquality;

impl<K> KeyEquality<K> for DefaultEquality
where
    K: Hash + Eq + ?Sized,
{
    fn hash_key(&self, key: &K) -> u64 {
        HASH_RANDOM_STATE.hash_one(key)
    }

    fn keys_equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Compares keys by a normalized form of the key.
///
/// For example, case insensitive string keys:
///
/// ```ignore
/// let eq = EqualityBy::new(|s: &String| s.to_lowercase());
/// ```
pub struct EqualityBy<F, N> {
    normalize: F,
    _normalized: PhantomData<fn() -> N>,
}

impl<F, N> EqualityBy<F, N> {
    pub const fn new(normalize: F) -> Self {
        EqualityBy {
            normalize,
            _normalized: PhantomData,
        }
    }
}

impl<F: Clone, N> Clone for EqualityBy<F, N> {
    fn clone(&self) -> Self {
        EqualityBy::new(self.normalize.clone())
    }
}

impl<F, N> std::fmt::Debug for EqualityBy<F, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqualityBy").finish_non_exhaustive()
    }
}

impl<K, F, N> KeyEquality<K> for EqualityBy<F, N>
where
    K: ?Sized,
    F: Fn(&K) -> N,
    N: Hash + Eq,
{
    fn hash_key(&self, key: &K) -> u64 {
        HASH_RANDOM_STATE.hash_one((self.normalize)(key))
    }

    fn keys_equal(&self, a: &K, b: &K) -> bool {
        (self.normalize)(a) == (self.normalize)(b)
    }
}

pub trait KeyOrdering<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Ascending natural order of the key type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K> KeyOrdering<K> for NaturalOrder
where
    K: Ord + ?Sized,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Descending natural order of the key type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseOrder;

impl<K> KeyOrdering<K> for ReverseOrder
where
    K: Ord + ?Sized,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}

impl<K, F> KeyOrdering<K> for F
where
    K: ?Sized,
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_equality_consistent_hash() {
        let eq = DefaultEquality;
        assert!(eq.keys_equal("a", "a"));
        assert!(!eq.keys_equal("a", "b"));
        assert_eq!(eq.hash_key("a"), eq.hash_key("a"));
    }

    #[test]
    fn equality_by_lowercase() {
        let eq: EqualityBy<_, String> = EqualityBy::new(|s: &str| s.to_lowercase());
        assert!(eq.keys_equal("Hello", "hELLO"));
        assert!(!eq.keys_equal("Hello", "world"));
        assert_eq!(eq.hash_key("ABC"), eq.hash_key("abc"));
    }

    #[test]
    fn orderings() {
        assert_eq!(Ordering::Less, NaturalOrder.compare(&1, &2));
        assert_eq!(Ordering::Greater, ReverseOrder.compare(&1, &2));

        let by_abs = |a: &i32, b: &i32| a.abs().cmp(&b.abs());
        assert_eq!(Ordering::Equal, by_abs.compare(&-3, &3));
    }
}
