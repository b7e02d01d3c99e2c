//! # Multisets
//!
//! A [`Multiset`] only remembers its composition: the distinct labels in
//! ascending order and how often each one occurs. The order in which the labels
//! were given is forgotten, since two inputs with the same per-label counts
//! describe the same set of permutations.

use std::fmt;

use itertools::Itertools;

use crate::error::{Mismatch, RankError};

/// A finite multiset of labels.
///
/// # Examples
///
/// ```
/// use multirank::multiset::Multiset;
///
/// let m = Multiset::new([12, 0, 12, 1]);
/// assert_eq!(m.labels(), &[0, 1, 12]);
/// assert_eq!(m.multiplicities(), &[1, 1, 2]);
/// assert_eq!(m.count().unwrap(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Multiset<L> {
    labels: Vec<L>,
    multiplicities: Vec<usize>,
    len: usize,
}

impl<L: Ord> Multiset<L> {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = L>,
    {
        let mut items: Vec<L> = items.into_iter().collect();
        items.sort();
        let len = items.len();
        let (multiplicities, labels) = items.into_iter().dedup_with_count().unzip();

        Multiset {
            labels,
            multiplicities,
            len,
        }
    }

    /// Position of `label` among the distinct labels, if present.
    pub fn index_of(&self, label: &L) -> Option<usize> {
        self.labels.binary_search(label).ok()
    }

    pub fn multiplicity(&self, label: &L) -> usize {
        self.index_of(label)
            .map(|i| self.multiplicities[i])
            .unwrap_or(0)
    }

    /// Checks that `sequence` has exactly the composition of `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use multirank::multiset::Multiset;
    /// # use multirank::error::Mismatch;
    /// let m = Multiset::new([0, 0, 1]);
    /// assert!(m.check_rearrangement(&[0, 1, 0]).is_ok());
    /// assert_eq!(
    ///     m.check_rearrangement(&[0, 1, 1]),
    ///     Err(Mismatch::Surplus { position: 2 })
    /// );
    /// ```
    pub fn check_rearrangement(&self, sequence: &[L]) -> Result<(), Mismatch> {
        if sequence.len() != self.len {
            return Err(Mismatch::Length {
                expected: self.len,
                found: sequence.len(),
            });
        }

        let mut remaining = self.multiplicities.clone();
        for (position, label) in sequence.iter().enumerate() {
            let i = self
                .index_of(label)
                .ok_or(Mismatch::UnknownLabel { position })?;
            if remaining[i] == 0 {
                return Err(Mismatch::Surplus { position });
            }
            remaining[i] -= 1;
        }
        // equal length and no surplus means every count is used up exactly
        Ok(())
    }
}

impl<L> Multiset<L> {
    /// Total number of elements, repetitions included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The distinct labels in ascending order.
    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    /// `multiplicities()[i]` is the number of occurrences of `labels()[i]`.
    pub fn multiplicities(&self) -> &[usize] {
        &self.multiplicities
    }

    /// The ascending arrangement, which is the first permutation in
    /// lexicographic order.
    pub fn sorted(&self) -> Vec<L>
    where
        L: Clone,
    {
        self.labels
            .iter()
            .zip(&self.multiplicities)
            .flat_map(|(label, &m)| std::iter::repeat(label.clone()).take(m))
            .collect()
    }

    /// Number of distinct permutations, the multinomial coefficient
    /// `len! / prod(multiplicity!)`.
    ///
    /// Computed as a product of binomial coefficients, so no factorial is ever
    /// materialized; every step is checked.
    pub fn count(&self) -> Result<u64, RankError> {
        let mut placed = 0;
        let mut total: u64 = 1;
        for &m in &self.multiplicities {
            placed += m;
            total = total
                .checked_mul(binomial(placed, m)?)
                .ok_or(RankError::ArithmeticOverflow {
                    what: "multinomial coefficient",
                })?;
        }
        Ok(total)
    }
}

/// Exact `n choose k`.
pub fn binomial(n: usize, k: usize) -> Result<u64, RankError> {
    const OVERFLOW: RankError = RankError::ArithmeticOverflow {
        what: "binomial coefficient",
    };

    if k > n {
        return Ok(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc == C(n, i) here, so acc * (n - i) is divisible by i + 1
        acc = acc.checked_mul((n - i) as u128).ok_or(OVERFLOW)? / (i as u128 + 1);
        // C(n, i) grows with i up to n / 2, a partial overflow is final
        if acc > u64::MAX as u128 {
            return Err(OVERFLOW);
        }
    }
    u64::try_from(acc).map_err(|_| OVERFLOW)
}

impl<L: Ord> FromIterator<L> for Multiset<L> {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        Multiset::new(iter)
    }
}

impl<L: fmt::Display> fmt::Display for Multiset<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .labels
            .iter()
            .zip(&self.multiplicities)
            .map(|(label, &m)| {
                if m == 1 {
                    label.to_string()
                } else {
                    format!("{label}^{m}")
                }
            })
            .join(", ");
        write!(f, "{{{parts}}}")
    }
}
