//! Error types for Caviar bundles.
//!
//! One error hierarchy is shared by the builder, the verifier and the runtime
//! so that a failure keeps its classification as it crosses crate boundaries.
//!
//! # Examples
//!
//! ```
//! use caviar_core::{Error, Result};
//!
//! fn open_asset(path: &str) -> Result<()> {
//!     Err(Error::NotFound {
//!         path: path.to_string(),
//!     })
//! }
//!
//! let err = open_asset("/opt/app/missing.txt").unwrap_err();
//! assert!(err.is_not_found());
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Which integrity check failed.
///
/// A single bad checksum and a payload whose length disagrees with the
/// manifest tally are reported separately: the latter means the container
/// itself is damaged, not just one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityScope {
    /// One object failed its checksum or range check.
    Object {
        /// Bundle-relative path of the object
        path: String,
    },
    /// The payload length differs from the sum of all file sizes.
    Aggregate {
        /// Sum of file sizes recorded in the manifest
        expected: u64,
        /// Actual payload length
        actual: u64,
    },
}

impl fmt::Display for IntegrityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { path } => write!(f, "object {path}"),
            Self::Aggregate { expected, actual } => {
                write!(f, "payload tally {expected} bytes, found {actual} bytes")
            }
        }
    }
}

/// Main error type for Caviar.
#[derive(Error, Debug)]
pub enum Error {
    /// No container could be opened at the executable or its sidecar path.
    #[error("Container not found: {path} ({reason})")]
    ContainerNotFound {
        /// Last path that was tried
        path: String,
        /// Why opening failed
        reason: String,
    },

    /// Manifest magic, root marker, or object shape is wrong.
    #[error("Schema mismatch: {reason}")]
    SchemaMismatch {
        /// Description of the mismatch
        reason: String,
    },

    /// The bundle declares an option this runtime refuses to honour.
    #[error("Unsupported option {option}: {reason}")]
    UnsupportedOption {
        /// Option name
        option: String,
        /// Why it is rejected
        reason: String,
    },

    /// Checksum, range, or payload-length verification failed.
    #[error("Integrity error in {scope}: {reason}")]
    Integrity {
        /// Which check failed
        scope: IntegrityScope,
        /// Details
        reason: String,
    },

    /// The path is inside the virtual root but names no bundled object.
    #[error("Bundle path not found: {path}")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// The call does not apply to this handle or argument.
    ///
    /// Reading a directory, seeking out of bounds, or closing a handle twice.
    #[error("Invalid operation {operation}: {reason}")]
    InvalidOperation {
        /// Operation name (`read`, `seek`, `close`, ...)
        operation: String,
        /// Why it is invalid
        reason: String,
    },

    /// Mutating calls on the immutable medium.
    #[error("Cannot {operation}: caviar files are read-only")]
    ReadOnly {
        /// Operation name (`write`, `truncate`, ...)
        operation: String,
    },

    /// `init` was called on a bootstrap that already ran.
    #[error("Caviar is already initialized")]
    AlreadyInitialized,

    /// The runtime never finished loading.
    #[error("Caviar is not ready: {reason}")]
    NotReady {
        /// Why the runtime is unavailable
        reason: String,
    },

    /// Two sources produce the same name in one directory.
    #[error("Duplicate bundle entry: {path}")]
    DuplicateEntry {
        /// Bundle-relative path of the clash
        path: String,
    },

    /// The zip layer rejected the container.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Manifest encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure while reading sources or writing output.
    #[error("IO error at {path}: {source}")]
    Io {
        /// File involved
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Creates an [`Error::InvalidOperation`].
    ///
    /// # Examples
    ///
    /// ```
    /// use caviar_core::Error;
    ///
    /// let err = Error::invalid("read", "cannot read directory as data");
    /// assert!(err.is_invalid_operation());
    /// ```
    #[must_use]
    pub fn invalid(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ReadOnly`] for the named operation.
    #[must_use]
    pub fn read_only(operation: &str) -> Self {
        Self::ReadOnly {
            operation: operation.to_string(),
        }
    }

    /// Wraps an I/O error with the path it concerns.
    #[must_use]
    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Returns `true` if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for misuse of a handle, including writes.
    ///
    /// # Examples
    ///
    /// ```
    /// use caviar_core::Error;
    ///
    /// assert!(Error::read_only("write").is_invalid_operation());
    /// ```
    #[must_use]
    pub const fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation { .. } | Self::ReadOnly { .. })
    }

    /// Returns `true` for checksum or payload-length failures.
    #[must_use]
    pub const fn is_integrity_error(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// Returns `true` only for the whole-payload length check.
    #[must_use]
    pub const fn is_aggregate_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::Integrity {
                scope: IntegrityScope::Aggregate { .. },
                ..
            }
        )
    }

    /// Returns `true` if the manifest shape is wrong.
    #[must_use]
    pub const fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::Serialization(_))
    }

    /// Returns `true` if the bundle asks for an unsupported option.
    #[must_use]
    pub const fn is_unsupported_option(&self) -> bool {
        matches!(self, Self::UnsupportedOption { .. })
    }

    /// Returns `true` if the runtime is not (and will not become) ready.
    #[must_use]
    pub const fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// Returns `true` for a repeated `init` call.
    #[must_use]
    pub const fn is_already_initialized(&self) -> bool {
        matches!(self, Self::AlreadyInitialized)
    }

    /// Returns `true` if no container could be located.
    #[must_use]
    pub const fn is_container_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound { .. })
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::NotFound { .. } | Error::ContainerNotFound { .. } => io::ErrorKind::NotFound,
            Error::ReadOnly { .. } => io::ErrorKind::ReadOnlyFilesystem,
            Error::InvalidOperation { .. } => io::ErrorKind::InvalidInput,
            Error::Integrity { .. } | Error::SchemaMismatch { .. } | Error::Serialization(_) => {
                io::ErrorKind::InvalidData
            }
            Error::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        };
        Self::new(kind, err)
    }
}

/// Result alias for Caviar operations.
pub type Result<T> = std::result::Result<T, Error>;
