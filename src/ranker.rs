//! # Ranking and Unranking
//!
//! [`MultisetRanker`] fixes a total order on the distinct permutations of a
//! multiset (ascending lexicographic order of the label sequences) and converts
//! between a permutation and its zero-based position in that order.
//!
//! ## Key Features:
//!
//! - **Enumeration**: `ranker.enumerate()` lazily walks every distinct
//!   permutation in order, `ranker.enumerate_from(k)` starts at rank `k`.
//! - **Ranking**: `ranker.rank(&p)` is the Lehmer code generalized to
//!   repeated labels.
//! - **Unranking**: `ranker.unrank(k)` is its inverse.
//! - **Counting**: `ranker.count()` is the multinomial coefficient, fixed at
//!   construction.
//!
//! Both directions work on "blocks": with `total` arrangements of a suffix of
//! length `len`, exactly `total * m / len` of them start with a label of
//! remaining multiplicity `m`. That quotient is always exact, so the walk never
//! needs factorials and never leaves the range of the final count.

use tracing::debug;

use crate::{
    enumerate::Permutations,
    error::{Mismatch, RankError},
    multiset::Multiset,
};

/// Number of arrangements of a suffix of length `suffix_len` (with `total`
/// arrangements overall) that begin with a label of multiplicity `multiplicity`.
fn block(total: u64, multiplicity: usize, suffix_len: usize) -> u64 {
    let size = u128::from(total) * multiplicity as u128 / suffix_len as u128;
    // multiplicity <= suffix_len, so size <= total
    size as u64
}

/// Ranks and unranks the distinct permutations of a [`Multiset`].
///
/// # Examples
///
/// ```
/// use multirank::ranker::MultisetRanker;
///
/// let ranker = MultisetRanker::from_labels([0, 0, 1]).unwrap();
/// assert_eq!(ranker.count(), 3);
/// assert_eq!(
///     ranker.enumerate().collect::<Vec<_>>(),
///     vec![vec![0, 0, 1], vec![0, 1, 0], vec![1, 0, 0]]
/// );
/// assert_eq!(ranker.rank(&[1, 0, 0]).unwrap(), 2);
/// assert_eq!(ranker.unrank(1).unwrap(), vec![0, 1, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisetRanker<L> {
    multiset: Multiset<L>,
    count: u64,
}

impl<L: Ord + Clone> MultisetRanker<L> {
    /// Fails with [`RankError::ArithmeticOverflow`] if the number of distinct
    /// permutations does not fit in a `u64`.
    pub fn new(multiset: Multiset<L>) -> Result<Self, RankError> {
        let count = multiset.count()?;
        debug!(
            len = multiset.len(),
            distinct = multiset.labels().len(),
            count,
            "ranker ready"
        );
        Ok(MultisetRanker { multiset, count })
    }

    pub fn from_labels<I>(labels: I) -> Result<Self, RankError>
    where
        I: IntoIterator<Item = L>,
    {
        Self::new(Multiset::new(labels))
    }

    pub fn multiset(&self) -> &Multiset<L> {
        &self.multiset
    }

    /// Total number of distinct permutations; valid ranks are `0..count()`.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// All distinct permutations in ascending lexicographic order. The `k`-th
    /// item has rank `k`.
    pub fn enumerate(&self) -> Permutations<L> {
        Permutations::new(self.multiset.sorted(), self.count)
    }

    /// The tail of [`enumerate`](Self::enumerate) starting at rank `start`.
    ///
    /// `start == count()` gives an empty iterator, so `0..count()` can be cut
    /// into chunks without special-casing the last one.
    pub fn enumerate_from(&self, start: u64) -> Result<Permutations<L>, RankError> {
        if start == self.count {
            return Ok(Permutations::new(Vec::new(), 0));
        }
        Ok(Permutations::new(self.unrank(start)?, self.count - start))
    }

    /// Position of `permutation` in the canonical order.
    ///
    /// Fails with [`RankError::InvalidPermutation`] if `permutation` is not a
    /// rearrangement of the multiset.
    ///
    /// # Examples
    ///
    /// ```
    /// # use multirank::ranker::MultisetRanker;
    /// let ranker = MultisetRanker::from_labels([0, 1, 2]).unwrap();
    /// assert_eq!(ranker.rank(&[1, 2, 0]).unwrap(), 3);
    /// assert!(ranker.rank(&[1, 1, 0]).is_err());
    /// ```
    pub fn rank(&self, permutation: &[L]) -> Result<u64, RankError> {
        self.multiset.check_rearrangement(permutation)?;

        let len = self.multiset.len();
        let mut remaining = self.multiset.multiplicities().to_vec();
        let mut total = self.count;
        let mut rank = 0;

        for (position, label) in permutation.iter().enumerate() {
            let suffix_len = len - position;
            let placed = self
                .multiset
                .index_of(label)
                .ok_or(Mismatch::UnknownLabel { position })?;

            // every arrangement starting with a smaller label comes first
            rank += remaining[..placed]
                .iter()
                .map(|&m| block(total, m, suffix_len))
                .sum::<u64>();

            total = block(total, remaining[placed], suffix_len);
            remaining[placed] -= 1;
        }

        Ok(rank)
    }

    /// The permutation at position `index` in the canonical order.
    ///
    /// Fails with [`RankError::IndexOutOfRange`] unless `index < count()`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use multirank::ranker::MultisetRanker;
    /// let ranker = MultisetRanker::from_labels([0, 1, 2]).unwrap();
    /// assert_eq!(ranker.unrank(3).unwrap(), vec![1, 2, 0]);
    /// assert!(ranker.unrank(6).is_err());
    /// ```
    pub fn unrank(&self, index: u64) -> Result<Vec<L>, RankError> {
        let out_of_range = RankError::IndexOutOfRange {
            index,
            count: self.count,
        };
        if index >= self.count {
            return Err(out_of_range);
        }

        let len = self.multiset.len();
        let labels = self.multiset.labels();
        let mut remaining = self.multiset.multiplicities().to_vec();
        let mut total = self.count;
        let mut offset = index;
        let mut permutation = Vec::with_capacity(len);

        for position in 0..len {
            let suffix_len = len - position;
            let (chosen, size) = remaining
                .iter()
                .enumerate()
                .find_map(|(i, &m)| {
                    let size = block(total, m, suffix_len);
                    if offset < size {
                        Some((i, size))
                    } else {
                        offset -= size;
                        None
                    }
                })
                // blocks partition 0..total and offset < total throughout
                .ok_or_else(|| out_of_range.clone())?;

            permutation.push(labels[chosen].clone());
            remaining[chosen] -= 1;
            total = size;
        }

        Ok(permutation)
    }
}
