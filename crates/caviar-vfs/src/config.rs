//! Runtime configuration.
//!
//! The bundle carries its own [`BundleOptions`](caviar_core::BundleOptions),
//! chosen at build time. A [`RuntimeConfig`] lets the embedding program
//! override them and tune the runtime when loading explicitly.
//!
//! # Examples
//!
//! ```
//! use caviar_vfs::{MatchPolicy, RuntimeConfig};
//!
//! // Use default configuration
//! let config = RuntimeConfig::default();
//! assert_eq!(config.read_chunk, caviar_vfs::READ_CHUNK_MAX);
//!
//! // Override the virtual root
//! let custom = RuntimeConfig {
//!     prefix: Some("/usr/share/app".into()),
//!     match_policy: MatchPolicy::AsciiCaseInsensitive,
//!     ..Default::default()
//! };
//! assert!(custom.validate().is_ok());
//! ```

use std::path::PathBuf;

/// Largest number of bytes a single `read` copies.
pub const READ_CHUNK_MAX: usize = 32 * 1024;

/// How path segments are compared with bundled names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchPolicy {
    /// Byte-for-byte comparison.
    #[default]
    CaseSensitive,
    /// ASCII letters compare equal regardless of case.
    AsciiCaseInsensitive,
}

impl MatchPolicy {
    /// Returns `true` if `segment` names the entry `name` under this policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use caviar_vfs::MatchPolicy;
    ///
    /// assert!(!MatchPolicy::CaseSensitive.matches("a.TXT", "a.txt"));
    /// assert!(MatchPolicy::AsciiCaseInsensitive.matches("a.TXT", "a.txt"));
    /// ```
    #[must_use]
    pub fn matches(self, segment: &str, name: &str) -> bool {
        match self {
            Self::CaseSensitive => segment == name,
            Self::AsciiCaseInsensitive => segment.eq_ignore_ascii_case(name),
        }
    }
}

/// Runtime configuration for a loaded bundle.
///
/// Unset overrides fall back to the bundle's own options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Virtual root override.
    ///
    /// Takes precedence over the bundle's `custom_prefix` and over the
    /// executable's directory. Must be absolute.
    ///
    /// Default: None (use the bundle's setting)
    pub prefix: Option<PathBuf>,

    /// Debug logging override.
    ///
    /// Default: None (use the bundle's setting)
    pub debug: Option<bool>,

    /// Path segment comparison.
    ///
    /// Default: [`MatchPolicy::CaseSensitive`]
    pub match_policy: MatchPolicy,

    /// Maximum bytes copied per `read` call.
    ///
    /// Default: [`READ_CHUNK_MAX`]
    pub read_chunk: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            debug: None,
            match_policy: MatchPolicy::default(),
            read_chunk: READ_CHUNK_MAX,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use caviar_vfs::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::builder()
    ///     .prefix("/opt/app")
    ///     .debug(true)
    ///     .read_chunk(4096)
    ///     .build();
    ///
    /// assert_eq!(config.read_chunk, 4096);
    /// assert_eq!(config.debug, Some(true));
    /// ```
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read chunk is zero
    /// - The prefix override is relative
    ///
    /// # Examples
    ///
    /// ```
    /// use caviar_vfs::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// let mut invalid = RuntimeConfig::default();
    /// invalid.read_chunk = 0;
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.read_chunk == 0 {
            return Err("Read chunk must be greater than zero".to_string());
        }

        if let Some(prefix) = &self.prefix
            && !prefix.is_absolute()
        {
            return Err(format!(
                "Prefix override must be an absolute path: {}",
                prefix.display()
            ));
        }

        Ok(())
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Creates a builder holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    /// Sets the virtual root override.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Forces debug logging on or off.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.config.debug = Some(debug);
        self
    }

    /// Sets the path matching policy.
    #[must_use]
    pub const fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.config.match_policy = policy;
        self
    }

    /// Sets the per-call read cap.
    #[must_use]
    pub const fn read_chunk(mut self, bytes: usize) -> Self {
        self.config.read_chunk = bytes;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
