//! # Lookup tables
//!
//! A [`Table`] maps the canonical string form of every distinct permutation of
//! a multiset to its rank. It is built once from a
//! [`MultisetRanker`], never mutated, and persisted as a flat key/value
//! document that a solver can load and query by key.
//!
//! The canonical string form is fixed by a [`KeyStyle`]: labels are written in
//! decimal, in permutation order, either back to back or joined by a
//! delimiter. Keys are stored in rank order, so for a fixed multiset, key style
//! and [`TableFormat`] the serialized bytes are identical on every run.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use indexmap::{map::Entry, IndexMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{error::RankError, ranker::MultisetRanker};

#[derive(Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Rank(#[from] RankError),

    #[error("label {label:?} cannot be written unambiguously as a {style} key")]
    AmbiguousKey { label: String, style: KeyStyle },

    #[error("cannot parse key {key:?}")]
    InvalidKey { key: String },

    #[error("key {key:?} is not in canonical form, expected {canonical:?}")]
    NonCanonicalKey { key: String, canonical: String },

    #[error("key {key:?} appears more than once")]
    DuplicateKey { key: String },

    #[error("entry {key:?} has rank {stored}, expected {expected}")]
    RankDisagreement {
        key: String,
        stored: u64,
        expected: u64,
    },

    #[error("ranks do not cover 0..{len} exactly once: {key:?} has rank {rank}")]
    NotBijective { key: String, rank: u64, len: u64 },

    #[error("table has {found} entries, the multiset has {expected} permutations")]
    WrongSize { expected: u64, found: u64 },

    #[error("cannot hold {count} entries in memory")]
    TooLarge { count: u64 },

    #[error("{} is not available in this build", .0)]
    FormatUnavailable(TableFormat),

    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "bincode")]
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[cfg(feature = "bincode")]
    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TableError + '_ {
    move |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// How a permutation is written as a table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyStyle {
    /// Labels back to back, `"01234567"`. Every label must render as a
    /// single character.
    Compact,
    /// Labels joined by the delimiter, `"0,1,12"`. No label may contain it.
    Delimited(char),
}

impl Default for KeyStyle {
    fn default() -> Self {
        KeyStyle::Delimited(',')
    }
}

impl fmt::Display for KeyStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStyle::Compact => write!(f, "compact"),
            KeyStyle::Delimited(d) => write!(f, "{d:?}-delimited"),
        }
    }
}

impl KeyStyle {
    /// # Examples
    ///
    /// ```
    /// use multirank::table::KeyStyle;
    ///
    /// assert_eq!(KeyStyle::Compact.encode(&[0, 3, 1]).unwrap(), "031");
    /// assert_eq!(KeyStyle::Delimited(',').encode(&[12, 0]).unwrap(), "12,0");
    /// assert!(KeyStyle::Compact.encode(&[12, 0]).is_err());
    /// ```
    pub fn encode<L: fmt::Display>(&self, permutation: &[L]) -> Result<String, TableError> {
        let mut key = String::new();
        for (i, label) in permutation.iter().enumerate() {
            let rendered = label.to_string();
            let ambiguous = match self {
                KeyStyle::Compact => rendered.chars().count() != 1,
                KeyStyle::Delimited(d) => rendered.is_empty() || rendered.contains(*d),
            };
            if ambiguous {
                return Err(TableError::AmbiguousKey {
                    label: rendered,
                    style: *self,
                });
            }
            if let (KeyStyle::Delimited(d), true) = (self, i > 0) {
                key.push(*d);
            }
            key.push_str(&rendered);
        }
        Ok(key)
    }

    /// Parses a key back into labels.
    pub fn decode<L: FromStr>(&self, key: &str) -> Result<Vec<L>, TableError> {
        let invalid = || TableError::InvalidKey {
            key: key.to_owned(),
        };
        if key.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            KeyStyle::Compact => key
                .chars()
                .map(|c| c.to_string().parse().map_err(|_| invalid()))
                .collect(),
            KeyStyle::Delimited(d) => key
                .split(*d)
                .map(|part| part.parse().map_err(|_| invalid()))
                .collect(),
        }
    }
}

/// On-disk representation of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableFormat {
    /// JSON object with `", "` and `": "` separators, `{"012": 0, "021": 1}`.
    #[default]
    Json,
    /// JSON object without whitespace.
    CompactJson,
    /// serde encoding through bincode's standard configuration.
    Bincode,
}

impl TableFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Json | TableFormat::CompactJson => "json",
            TableFormat::Bincode => "bin",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableFormat::Json => "json",
            TableFormat::CompactJson => "compact json",
            TableFormat::Bincode => "bincode",
        };
        f.write_str(name)
    }
}

/// JSON formatter using the separators of Python's `json.dumps`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }
}

/// Removes a partially written file unless disarmed.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        PartialFile { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => warn!(path = %self.path.display(), "removed partial table"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "could not remove partial table"),
        }
    }
}

/// Tables whose file name ends in `.gz` are gzip-compressed.
pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Immutable map from permutation key to rank.
///
/// # Examples
///
/// ```
/// use multirank::ranker::MultisetRanker;
/// use multirank::table::{KeyStyle, Table};
///
/// let ranker = MultisetRanker::from_labels([0, 0, 1]).unwrap();
/// let table = Table::build(&ranker, KeyStyle::Compact).unwrap();
/// assert_eq!(table.len(), 3);
/// assert_eq!(table.get("010"), Some(1));
/// assert_eq!(table.keys().collect::<Vec<_>>(), vec!["001", "010", "100"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    entries: IndexMap<String, u64>,
}

impl Table {
    /// Pairs every enumerated permutation with its position.
    pub fn build<L>(ranker: &MultisetRanker<L>, style: KeyStyle) -> Result<Self, TableError>
    where
        L: Ord + Clone + fmt::Display,
    {
        Self::build_with(ranker, style, false)
    }

    /// Like [`build`](Self::build), but also ranks every permutation and
    /// fails with [`TableError::RankDisagreement`] if rank and position differ.
    pub fn build_checked<L>(ranker: &MultisetRanker<L>, style: KeyStyle) -> Result<Self, TableError>
    where
        L: Ord + Clone + fmt::Display,
    {
        Self::build_with(ranker, style, true)
    }

    fn build_with<L>(
        ranker: &MultisetRanker<L>,
        style: KeyStyle,
        cross_check: bool,
    ) -> Result<Self, TableError>
    where
        L: Ord + Clone + fmt::Display,
    {
        let too_large = || TableError::TooLarge {
            count: ranker.count(),
        };
        let capacity = usize::try_from(ranker.count()).map_err(|_| too_large())?;
        let mut entries = IndexMap::new();
        entries.try_reserve(capacity).map_err(|_| too_large())?;

        for (position, permutation) in (0u64..).zip(ranker.enumerate()) {
            let key = style.encode(&permutation)?;
            if cross_check {
                let rank = ranker.rank(&permutation)?;
                if rank != position {
                    return Err(TableError::RankDisagreement {
                        key,
                        stored: position,
                        expected: rank,
                    });
                }
            }
            match entries.entry(key) {
                Entry::Occupied(e) => {
                    return Err(TableError::DuplicateKey {
                        key: e.key().clone(),
                    })
                }
                Entry::Vacant(e) => {
                    e.insert(position);
                }
            }
        }

        debug!(
            multiset = %ranker.multiset().labels().iter().join(","),
            entries = entries.len(),
            %style,
            cross_check,
            "table built"
        );
        Ok(Table { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in storage order, which is rank order for built tables.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, &r)| (k.as_str(), r))
    }

    /// Checks that the ranks are exactly `0..len()`, each used once.
    pub fn validate(&self) -> Result<(), TableError> {
        let len = self.entries.len() as u64;
        let mut seen = vec![false; self.entries.len()];
        for (key, &rank) in &self.entries {
            let slot = usize::try_from(rank).ok().filter(|&r| r < seen.len());
            match slot {
                Some(r) if !seen[r] => seen[r] = true,
                _ => {
                    return Err(TableError::NotBijective {
                        key: key.clone(),
                        rank,
                        len,
                    })
                }
            }
        }
        Ok(())
    }

    /// Checks every entry against `ranker`: the table must hold exactly
    /// `count()` entries and each key must be the canonical `style` key of a
    /// permutation of that rank.
    pub fn validate_against<L>(
        &self,
        ranker: &MultisetRanker<L>,
        style: KeyStyle,
    ) -> Result<(), TableError>
    where
        L: Ord + Clone + FromStr + fmt::Display,
    {
        let found = self.entries.len() as u64;
        if found != ranker.count() {
            return Err(TableError::WrongSize {
                expected: ranker.count(),
                found,
            });
        }
        for (key, &stored) in &self.entries {
            let permutation: Vec<L> = style.decode(key)?;
            let canonical = style.encode(&permutation)?;
            if canonical != *key {
                return Err(TableError::NonCanonicalKey {
                    key: key.clone(),
                    canonical,
                });
            }
            let expected = ranker.rank(&permutation)?;
            if expected != stored {
                return Err(TableError::RankDisagreement {
                    key: key.clone(),
                    stored,
                    expected,
                });
            }
        }
        // canonical keys are distinct, so their permutations and ranks are too
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W, format: TableFormat) -> Result<(), TableError> {
        match format {
            TableFormat::Json => {
                let mut ser = serde_json::Serializer::with_formatter(&mut writer, SpacedFormatter);
                self.serialize(&mut ser)?;
            }
            TableFormat::CompactJson => serde_json::to_writer(&mut writer, self)?,
            #[cfg(feature = "bincode")]
            TableFormat::Bincode => {
                bincode::serde::encode_into_std_write(
                    self,
                    &mut writer,
                    bincode::config::standard(),
                )?;
            }
            #[cfg(not(feature = "bincode"))]
            TableFormat::Bincode => return Err(TableError::FormatUnavailable(format)),
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R, format: TableFormat) -> Result<Self, TableError> {
        let table: Table = match format {
            TableFormat::Json | TableFormat::CompactJson => serde_json::from_reader(reader)?,
            #[cfg(feature = "bincode")]
            TableFormat::Bincode => {
                let mut reader = reader;
                bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?
            }
            #[cfg(not(feature = "bincode"))]
            TableFormat::Bincode => return Err(TableError::FormatUnavailable(format)),
        };
        Ok(table)
    }

    /// Writes the table to `path` atomically, gzip-compressed if
    /// [`is_gzip`] holds for `path`.
    ///
    /// The bytes go to a sibling `<name>.partial` file which is synced and then
    /// renamed over `path`. On failure the partial file is removed, so `path`
    /// either holds a complete table or is left as it was.
    pub fn persist(&self, path: &Path, format: TableFormat) -> Result<(), TableError> {
        let partial = partial_path(path);
        let guard = PartialFile::new(partial.clone());

        let file = File::create(&partial).map_err(io_error(&partial))?;
        let mut writer = BufWriter::new(file);
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(&mut writer, Compression::default());
            self.write_to(&mut encoder, format)?;
            encoder.finish().map_err(io_error(&partial))?;
        } else {
            self.write_to(&mut writer, format)?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| io_error(&partial)(e.into_error()))?;
        file.sync_all().map_err(io_error(&partial))?;
        drop(file);

        fs::rename(&partial, path).map_err(io_error(path))?;
        guard.disarm();

        info!(path = %path.display(), entries = self.len(), %format, "table written");
        Ok(())
    }

    pub fn load(path: &Path, format: TableFormat) -> Result<Self, TableError> {
        let file = File::open(path).map_err(io_error(path))?;
        let reader = BufReader::new(file);
        let table = if is_gzip(path) {
            Self::read_from(GzDecoder::new(reader), format)?
        } else {
            Self::read_from(reader, format)?
        };
        debug!(path = %path.display(), entries = table.len(), "table loaded");
        Ok(table)
    }
}

impl FromIterator<(String, u64)> for Table {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Table {
            entries: iter.into_iter().collect(),
        }
    }
}
