//! Per-OS field offset tables.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;

use crate::WalkError;

/// The operating system family an offset table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Linux.
    Linux,

    /// Windows.
    Windows,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("Linux"),
            Self::Windows => f.write_str("Windows"),
        }
    }
}

impl FromStr for OsFamily {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(WalkError::UnsupportedOs(s.to_owned())),
        }
    }
}

/// An immutable mapping from symbolic field names to byte offsets.
///
/// Each table belongs to exactly one [`OsFamily`]. Offset `0` is a valid
/// offset; a missing field is reported as [`WalkError::UnknownField`].
///
/// # Examples
///
/// ```
/// # use kwalk_core::{OffsetTable, OsFamily};
/// let offsets = OffsetTable::new(OsFamily::Linux, [("linux_tasks", 0x3a0), ("count", 0)]);
///
/// assert_eq!(offsets.offset("linux_tasks").unwrap(), 0x3a0);
/// assert_eq!(offsets.offset("count").unwrap(), 0);
/// assert!(offsets.offset("linux_pid").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct OffsetTable {
    os: OsFamily,
    entries: IndexMap<String, u64>,
}

impl OffsetTable {
    /// Creates a new offset table from `(name, offset)` pairs.
    ///
    /// Later duplicates override earlier ones.
    pub fn new<I, S>(os: OsFamily, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            os,
            entries: entries
                .into_iter()
                .map(|(name, offset)| (name.into(), offset))
                .collect(),
        }
    }

    /// Returns the OS family of this table.
    pub fn os(&self) -> OsFamily {
        self.os
    }

    /// Looks up an offset, returning `None` if the field is unknown.
    pub fn get(&self, field: &str) -> Option<u64> {
        self.entries.get(field).copied()
    }

    /// Looks up an offset.
    pub fn offset(&self, field: &str) -> Result<u64, WalkError> {
        self.get(field).ok_or_else(|| WalkError::UnknownField {
            os: self.os,
            field: field.to_owned(),
        })
    }

    /// Checks that the table targets `os`.
    pub fn expect_os(&self, os: OsFamily) -> Result<(), WalkError> {
        if self.os != os {
            return Err(WalkError::UnsupportedOs(self.os.to_string()));
        }

        Ok(())
    }

    /// Returns `true` if the table contains `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(name, offset)| (name.as_str(), *offset))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
