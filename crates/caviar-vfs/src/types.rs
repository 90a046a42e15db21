//! Core types for the virtual filesystem.
//!
//! # Examples
//!
//! ```
//! use caviar_vfs::{DirBatch, Fd, FileInfo};
//!
//! let fd = Fd::new(3);
//! assert_eq!(fd.as_usize(), 3);
//!
//! let info = FileInfo::file("a.txt", 2);
//! assert!(!info.is_dir());
//! assert_eq!(info.mode & 0o777, 0o444);
//!
//! let batch: DirBatch<String> = DirBatch::End;
//! assert!(batch.is_end());
//! ```

use caviar_core::manifest::{MODE_DIR, MODE_FILE};
use std::fmt;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Permission bits reported for every bundled directory.
pub const DIR_PERMISSIONS: u32 = 0o555;

/// Permission bits reported for every bundled file.
pub const FILE_PERMISSIONS: u32 = 0o444;

/// Handle to an open bundled file or directory.
///
/// Handles are small integers; a closed handle's number is handed out again
/// by a later `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(usize);

impl Fd {
    /// Wraps a raw handle number.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw handle number.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// Metadata of a bundled entry, shaped like [`std::fs::Metadata`].
///
/// Bundled entries report synthetic permissions and one shared modification
/// time ([`UNIX_EPOCH`]); build-time timestamps are not exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Last path segment
    pub name: String,
    /// Byte length; 0 for directories
    pub size: u64,
    /// Type flag plus permission bits
    pub mode: u32,
    /// Modification time
    pub modified: SystemTime,
}

impl FileInfo {
    /// Metadata for a bundled directory.
    #[must_use]
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mode: MODE_DIR | DIR_PERMISSIONS,
            modified: UNIX_EPOCH,
        }
    }

    /// Metadata for a bundled file.
    #[must_use]
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mode: MODE_FILE | FILE_PERMISSIONS,
            modified: UNIX_EPOCH,
        }
    }

    /// Converts real-filesystem metadata, for fallback paths.
    #[must_use]
    pub fn from_native(name: impl Into<String>, meta: &Metadata) -> Self {
        let writable = if meta.permissions().readonly() { 0 } else { 0o200 };
        let (flag, perm, size) = if meta.is_dir() {
            (MODE_DIR, DIR_PERMISSIONS | writable, 0)
        } else {
            (MODE_FILE, FILE_PERMISSIONS | writable, meta.len())
        };
        Self {
            name: name.into(),
            size,
            mode: flag | perm,
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
        }
    }

    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    /// Returns `true` for regular files.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        !self.is_dir()
    }
}

/// Result of a bounded directory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirBatch<T> {
    /// Entries read from the cursor, possibly empty for unbounded reads
    Entries(Vec<T>),
    /// A bounded read found nothing left
    End,
}

impl<T> DirBatch<T> {
    /// Returns `true` at end-of-stream.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns the entries, empty at end-of-stream.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Entries(entries) => entries,
            Self::End => Vec::new(),
        }
    }
}

/// One entry produced by [`Runtime::walk`](crate::Runtime::walk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Absolute virtual path
    pub path: PathBuf,
    /// Entry metadata
    pub info: FileInfo,
}
