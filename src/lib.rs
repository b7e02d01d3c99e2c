//! # Multirank
//!
//! Multirank ranks and unranks the distinct permutations of a multiset, where
//! repeated labels are indistinguishable from one another. Permutations are
//! ordered lexicographically, so `rank` of the `k`-th permutation produced by
//! `enumerate` is `k`.
//!
//! On top of the ranking engine it builds lookup tables mapping each
//! permutation (written as a string key) to its rank, the form in which
//! coordinate tables are consumed by puzzle solvers. Presets cover the cube
//! corner permutation and the two halves of the edge permutation.
//!
//! ```
//! use multirank::ranker::MultisetRanker;
//!
//! let ranker = MultisetRanker::from_labels([0, 1, 2]).unwrap();
//! assert_eq!(ranker.count(), 6);
//! assert_eq!(ranker.rank(&[1, 2, 0]).unwrap(), 3);
//! assert_eq!(ranker.unrank(3).unwrap(), vec![1, 2, 0]);
//! ```

pub mod enumerate;
pub mod error;
pub mod multiset;
pub mod presets;
pub mod ranker;
pub mod table;
