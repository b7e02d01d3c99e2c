//! # Errors
//!
//! Every failure of the ranking engine is reported through [`RankError`].

use thiserror::Error;

/// Why a sequence is not a rearrangement of the configured multiset.
///
/// Positions are reported instead of label values so the error stays
/// independent of the label type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    #[error("expected {expected} labels, found {found}")]
    Length { expected: usize, found: usize },

    #[error("label at position {position} does not occur in the multiset")]
    UnknownLabel { position: usize },

    #[error("label at position {position} occurs more often than in the multiset")]
    Surplus { position: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("invalid permutation: {0}")]
    InvalidPermutation(#[from] Mismatch),

    #[error("index {index} out of range, the multiset has {count} distinct permutations")]
    IndexOutOfRange { index: u64, count: u64 },

    #[error("arithmetic overflow while computing {what}")]
    ArithmeticOverflow { what: &'static str },
}
