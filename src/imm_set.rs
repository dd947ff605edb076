//! The immutable, per-base ordered collection.
//!
//! The join/split/routing protocol is generic over any type implementing
//! [`ImmutableSet`]; this module ships one concrete implementation (a
//! copy-on-write sorted slice) used as the default. Swapping it for another
//! persistent ordered container is a matter of implementing the trait.

use std::sync::Arc;

/// A pure, persistent ordered set of `i64` keys.
///
/// Every mutating method returns a new value; `self` is left untouched.
/// Implementations must keep elements sorted ascending and free of
/// duplicates.
pub trait ImmutableSet: Clone + Send + Sync + 'static {
    fn empty() -> Self;
    /// Returns the new set and whether the key was newly inserted.
    fn insert(&self, key: i64) -> (Self, bool);
    /// Returns the new set and whether the key was present and removed.
    fn remove(&self, key: i64) -> (Self, bool);
    fn contains(&self, key: i64) -> bool;
    /// Ascending keys in `[lo, hi]`.
    fn range(&self, lo: i64, hi: i64) -> Vec<i64>;
    fn min(&self) -> Option<i64>;
    fn max(&self) -> Option<i64>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Concatenate `self` and `other`. Callers guarantee the key ranges do
    /// not overlap.
    fn join(&self, other: &Self) -> Self;
    /// Partition into `(< key, >= key)`.
    fn split_at(&self, key: i64) -> (Self, Self);
    /// The key used as a split point when this set is split in two. Callers
    /// guarantee `len() >= 2`.
    fn median_key(&self) -> i64;
    fn to_vec(&self) -> Vec<i64>;
}

/// A copy-on-write sorted-vector set: the default [`ImmutableSet`].
#[derive(Debug, Clone)]
pub struct SortedSet {
    keys: Arc<Vec<i64>>,
}

impl SortedSet {
    pub fn from_sorted_vec(keys: Vec<i64>) -> Self {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        Self { keys: Arc::new(keys) }
    }

    pub fn from_unsorted(mut keys: Vec<i64>) -> Self {
        keys.sort_unstable();
        keys.dedup();
        Self { keys: Arc::new(keys) }
    }
}

impl ImmutableSet for SortedSet {
    fn empty() -> Self {
        Self {
            keys: Arc::new(Vec::new()),
        }
    }

    fn insert(&self, key: i64) -> (Self, bool) {
        match self.keys.binary_search(&key) {
            Ok(_) => (self.clone(), false),
            Err(idx) => {
                let mut v = (*self.keys).clone();
                v.insert(idx, key);
                (Self { keys: Arc::new(v) }, true)
            }
        }
    }

    fn remove(&self, key: i64) -> (Self, bool) {
        match self.keys.binary_search(&key) {
            Err(_) => (self.clone(), false),
            Ok(idx) => {
                let mut v = (*self.keys).clone();
                v.remove(idx);
                (Self { keys: Arc::new(v) }, true)
            }
        }
    }

    fn contains(&self, key: i64) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    fn range(&self, lo: i64, hi: i64) -> Vec<i64> {
        let start = self.keys.partition_point(|&k| k < lo);
        let end = self.keys.partition_point(|&k| k <= hi);
        self.keys[start..end].to_vec()
    }

    fn min(&self) -> Option<i64> {
        self.keys.first().copied()
    }

    fn max(&self) -> Option<i64> {
        self.keys.last().copied()
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn join(&self, other: &Self) -> Self {
        let mut v = Vec::with_capacity(self.keys.len() + other.keys.len());
        v.extend_from_slice(&self.keys);
        v.extend_from_slice(&other.keys);
        v.sort_unstable();
        Self { keys: Arc::new(v) }
    }

    fn split_at(&self, key: i64) -> (Self, Self) {
        let idx = self.keys.partition_point(|&k| k < key);
        let left = self.keys[..idx].to_vec();
        let right = self.keys[idx..].to_vec();
        (
            Self { keys: Arc::new(left) },
            Self { keys: Arc::new(right) },
        )
    }

    fn median_key(&self) -> i64 {
        self.keys[self.keys.len() / 2]
    }

    fn to_vec(&self) -> Vec<i64> {
        (*self.keys).clone()
    }
}
