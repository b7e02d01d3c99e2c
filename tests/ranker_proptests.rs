//! Property-based tests for ranking, unranking and enumeration.
//!
//! Multisets are kept small (at most nine elements over five labels) so that
//! full enumerations stay cheap.

use ahash::AHashSet;
use multirank::error::{Mismatch, RankError};
use multirank::multiset::Multiset;
use multirank::ranker::MultisetRanker;
use proptest::prelude::*;
use proptest::sample::Index;

// ============================================================================
//  Strategies
// ============================================================================

/// Unsorted label sequences with plenty of repetition.
fn labels() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..5, 0..=9)
}

/// A label sequence together with one of its rearrangements.
fn labels_and_rearrangement() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    labels().prop_flat_map(|l| (Just(l.clone()), Just(l).prop_shuffle()))
}

/// `n! / (m_1! * ... * m_k!)`, computed without the ranker.
fn multinomial(labels: &[u8]) -> u64 {
    let factorial = |n: usize| (1..=n as u128).product::<u128>();
    let mut counts = [0usize; 256];
    for &l in labels {
        counts[l as usize] += 1;
    }
    let denominator: u128 = counts.iter().map(|&m| factorial(m)).product();
    (factorial(labels.len()) / denominator) as u64
}

// ============================================================================
//  Counting
// ============================================================================

proptest! {
    /// count() is the multinomial coefficient of the multiplicities.
    #[test]
    fn count_is_multinomial(l in labels()) {
        let ranker = MultisetRanker::from_labels(l.clone()).unwrap();
        prop_assert_eq!(ranker.count(), multinomial(&l));
        prop_assert_eq!(Multiset::new(l.iter().copied()).count(), Ok(multinomial(&l)));
    }

    /// Input order does not matter.
    #[test]
    fn multiset_ignores_input_order((l, shuffled) in labels_and_rearrangement()) {
        prop_assert_eq!(Multiset::new(l), Multiset::new(shuffled));
    }
}

// ============================================================================
//  Rank / Unrank Inverse Properties
// ============================================================================

proptest! {
    /// rank(unrank(k)) == k for every valid index.
    #[test]
    fn rank_inverts_unrank(l in labels(), pick in any::<Index>()) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let k = pick.index(ranker.count() as usize) as u64;
        let p = ranker.unrank(k).unwrap();
        prop_assert_eq!(ranker.rank(&p), Ok(k));
    }

    /// unrank(rank(p)) == p for every rearrangement.
    #[test]
    fn unrank_inverts_rank((l, p) in labels_and_rearrangement()) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let k = ranker.rank(&p).unwrap();
        prop_assert!(k < ranker.count());
        prop_assert_eq!(ranker.unrank(k), Ok(p));
    }

    /// Indices at or past count() are rejected.
    #[test]
    fn unrank_rejects_out_of_range(l in labels(), past in 0u64..1000) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let index = ranker.count() + past;
        prop_assert_eq!(
            ranker.unrank(index),
            Err(RankError::IndexOutOfRange { index, count: ranker.count() })
        );
    }
}

// ============================================================================
//  Enumeration Properties
// ============================================================================

proptest! {
    /// Enumeration is strictly ascending, duplicate free and exactly count() long.
    #[test]
    fn enumeration_is_strictly_ascending(l in labels()) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let all = ranker.enumerate().collect::<Vec<_>>();

        prop_assert_eq!(all.len() as u64, ranker.count());
        prop_assert!(all.windows(2).all(|w| w[0] < w[1]));
        let distinct: AHashSet<&Vec<u8>> = all.iter().collect();
        prop_assert_eq!(distinct.len(), all.len());
    }

    /// The k-th enumerated permutation has rank k.
    #[test]
    fn enumeration_position_is_rank(l in labels()) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        for (k, p) in ranker.enumerate().enumerate() {
            prop_assert_eq!(ranker.rank(&p), Ok(k as u64));
        }
    }

    /// enumerate_from(k) starts at unrank(k) and has the right length.
    #[test]
    fn enumerate_from_starts_at_unrank(l in labels(), pick in any::<Index>()) {
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let k = pick.index(ranker.count() as usize) as u64;
        let mut tail = ranker.enumerate_from(k).unwrap();
        prop_assert_eq!(tail.len() as u64, ranker.count() - k);
        prop_assert_eq!(tail.next(), Some(ranker.unrank(k).unwrap()));
    }
}

// ============================================================================
//  Rejection Properties
// ============================================================================

proptest! {
    /// Any change of length is a length mismatch.
    #[test]
    fn wrong_length_is_rejected((l, mut p) in labels_and_rearrangement(), extra in 0u8..5) {
        let ranker = MultisetRanker::from_labels(l.clone()).unwrap();
        p.push(extra);
        prop_assert_eq!(
            ranker.rank(&p),
            Err(RankError::InvalidPermutation(Mismatch::Length {
                expected: l.len(),
                found: l.len() + 1,
            }))
        );
    }

    /// A label outside the multiset is reported at its position.
    #[test]
    fn unknown_label_is_rejected(
        (l, mut p) in labels_and_rearrangement(),
        pick in any::<Index>(),
    ) {
        prop_assume!(!p.is_empty());
        let ranker = MultisetRanker::from_labels(l).unwrap();
        let position = pick.index(p.len());
        p[position] = 99;
        prop_assert_eq!(
            ranker.rank(&p),
            Err(RankError::InvalidPermutation(Mismatch::UnknownLabel { position }))
        );
    }

    /// Swapping one occurrence for another present label breaks the counts.
    #[test]
    fn wrong_multiplicities_are_rejected(
        (l, mut p) in labels_and_rearrangement(),
        from in any::<Index>(),
        to in any::<Index>(),
    ) {
        prop_assume!(!p.is_empty());
        let i = from.index(p.len());
        let j = to.index(p.len());
        prop_assume!(p[i] != p[j]);
        let ranker = MultisetRanker::from_labels(l).unwrap();
        p[i] = p[j];
        prop_assert!(matches!(
            ranker.rank(&p),
            Err(RankError::InvalidPermutation(Mismatch::Surplus { .. }))
        ), "expected Err(InvalidPermutation(Mismatch::Surplus))");
    }
}
