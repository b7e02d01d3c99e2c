//! # Lexicographic enumeration
//!
//! [`next_permutation`] steps a sequence to its lexicographic successor in
//! place. Because it compares values rather than positions, equal labels are
//! never swapped with each other and every distinct arrangement of a multiset
//! is produced exactly once.
//!
//! [`Permutations`] wraps the stepping into a lazy iterator. It is created by
//! [`MultisetRanker::enumerate`](crate::ranker::MultisetRanker::enumerate),
//! which is what hands it the starting arrangement and the exact number of
//! items left.

use std::iter::FusedIterator;

/// Rearranges `a` into its lexicographic successor.
///
/// Returns `false`, leaving `a` untouched, when `a` is already the last
/// (non-increasing) arrangement.
///
/// # Examples
///
/// ```
/// use multirank::enumerate::next_permutation;
///
/// let mut a = [0, 1, 0];
/// assert!(next_permutation(&mut a));
/// assert_eq!(a, [1, 0, 0]);
/// assert!(!next_permutation(&mut a));
/// assert_eq!(a, [1, 0, 0]);
/// ```
pub fn next_permutation<T: Ord>(a: &mut [T]) -> bool {
    if a.len() < 2 {
        return false;
    }
    // Rightmost ascent: the pivot sits just before the longest non-increasing suffix
    let mut i = a.len() - 2;
    while a[i] >= a[i + 1] {
        if i == 0 {
            return false;
        }
        i -= 1;
    }
    // Rightmost element strictly larger than the pivot, which is the smallest such one
    let mut j = a.len() - 1;
    while a[j] <= a[i] {
        j -= 1;
    }
    a.swap(i, j);
    a[i + 1..].reverse();
    true
}

/// Lazy iterator over the distinct arrangements of a multiset in ascending
/// lexicographic order.
///
/// Each call to `enumerate` gives a fresh iterator, so an enumeration can be
/// restarted at will. A single iterator is meant for one reader.
#[derive(Debug, Clone)]
pub struct Permutations<L> {
    current: Option<Vec<L>>,
    remaining: u64,
}

impl<L> Permutations<L> {
    /// `start` must be an arrangement whose position is `total - remaining`,
    /// with `remaining` counting `start` itself.
    pub(crate) fn new(start: Vec<L>, remaining: u64) -> Self {
        Permutations {
            current: (remaining > 0).then_some(start),
            remaining,
        }
    }

    /// Exact number of arrangements still to be yielded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<L: Ord + Clone> Iterator for Permutations<L> {
    type Item = Vec<L>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.as_mut()?;
        let item = current.clone();
        self.remaining -= 1;
        if self.remaining == 0 || !next_permutation(current) {
            self.current = None;
            self.remaining = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (len, Some(len))
    }
}

impl<L: Ord + Clone> ExactSizeIterator for Permutations<L> {}

impl<L: Ord + Clone> FusedIterator for Permutations<L> {}
