//! # Cube presets
//!
//! The three multisets a cube solver builds permutation tables for: the eight
//! corner positions, and the twelve edge slots split into two halves. Each
//! half tracks six real edges while the other six slots hold [`DONT_CARE`].

use std::fmt;

use crate::{multiset::Multiset, table::KeyStyle};

/// Placeholder label for edge slots whose occupant is not tracked.
pub const DONT_CARE: u8 = 12;

/// The eight corner labels `0..=7`.
pub fn corners() -> Multiset<u8> {
    Multiset::new(0..8)
}

/// Edges `0..=5` plus six placeholders.
pub fn edges1() -> Multiset<u8> {
    Multiset::new((0..6).chain([DONT_CARE; 6]))
}

/// Six placeholders plus edges `6..=11`.
pub fn edges2() -> Multiset<u8> {
    Multiset::new([DONT_CARE; 6].into_iter().chain(6..12))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Preset {
    Corners,
    Edges1,
    Edges2,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Corners, Preset::Edges1, Preset::Edges2];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Corners => "corners",
            Preset::Edges1 => "edges1",
            Preset::Edges2 => "edges2",
        }
    }

    pub fn multiset(self) -> Multiset<u8> {
        match self {
            Preset::Corners => corners(),
            Preset::Edges1 => edges1(),
            Preset::Edges2 => edges2(),
        }
    }

    /// Corner keys are single digits written back to back (`"01234567"`),
    /// edge keys need a delimiter because of the two-digit labels.
    pub fn key_style(self) -> KeyStyle {
        match self {
            Preset::Corners => KeyStyle::Compact,
            Preset::Edges1 | Preset::Edges2 => KeyStyle::Delimited(','),
        }
    }

    /// File name of the generated table, without extension.
    pub fn file_stem(self) -> &'static str {
        match self {
            Preset::Corners => "corner_permutations",
            Preset::Edges1 => "edges1_permutations",
            Preset::Edges2 => "edges2_permutations",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
