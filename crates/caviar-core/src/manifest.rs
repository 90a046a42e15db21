//! Manifest schema.
//!
//! The manifest is the metadata half of a container: a tree of [`Object`]s
//! describing every bundled file and directory, plus the [`BundleOptions`]
//! chosen at build time. It is serialized as JSON into the `Manifest.json`
//! archive entry and decoded once at load.
//!
//! # Examples
//!
//! ```
//! use caviar_core::manifest::{Manifest, Object, MANIFEST_MAGIC, ROOT_NAME};
//!
//! let mut manifest = Manifest::new("example");
//! manifest.root.children.push(Object::file("a.txt", 0o644, 0, 2, 0, 0x1234));
//!
//! assert_eq!(manifest.magic, MANIFEST_MAGIC);
//! assert_eq!(manifest.root.name, ROOT_NAME);
//! assert_eq!(manifest.file_bytes(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic value every manifest must carry.
pub const MANIFEST_MAGIC: &str = "CAVIAR";

/// Name of the root directory object.
pub const ROOT_NAME: &str = "ROOT";

/// Extension of detached (sidecar) containers.
pub const BUNDLE_EXTENSION: &str = "cvr";

/// Archive entry holding the serialized manifest.
pub const MANIFEST_ENTRY: &str = "Manifest.json";

/// Archive entry holding the concatenated payload.
pub const ASSETS_ENTRY: &str = "Assets.bin";

/// Directory flag in [`Object::mode_bits`] (`S_IFDIR`).
pub const MODE_DIR: u32 = 0o040_000;

/// Regular-file flag in [`Object::mode_bits`] (`S_IFREG`).
pub const MODE_FILE: u32 = 0o100_000;

/// Permission bits portion of a mode.
pub const MODE_PERM_MASK: u32 = 0o7777;

/// How assets are made available at runtime.
///
/// Only [`ExtractionMode::Memory`] is accepted by the loader; the others are
/// valid in the schema so that bundles declaring them fail loudly instead of
/// being silently treated as memory-resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Keep the whole payload in memory.
    #[default]
    Memory,
    /// Unpack to a temporary directory.
    Temp,
    /// Unpack next to the executable.
    ExecutableDir,
}

impl ExtractionMode {
    /// Returns the serialized name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Temp => "temp",
            Self::ExecutableDir => "executable-dir",
        }
    }

    /// Returns `true` if the runtime can load bundles in this mode.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options chosen by the program creating the bundle.
///
/// The loader runs before the application can pass it anything, so these
/// travel inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleOptions {
    /// Fixed virtual root (e.g. `/usr/share/myprogram`). Empty means the
    /// executable's directory.
    pub custom_prefix: String,
    /// Log every internal error through `tracing`.
    pub debug: bool,
    /// See [`ExtractionMode`].
    pub extraction_mode: ExtractionMode,
}

/// A file or directory node in the manifest tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// One path segment, never a full path.
    pub name: String,
    /// Unix-style mode; [`MODE_DIR`] marks directories.
    pub mode_bits: u32,
    /// Modification time in seconds since the Unix epoch.
    pub mod_time: i64,
    /// File size; 0 for directories.
    pub size: u64,
    /// Offset into the payload; 0 for directories and empty files.
    pub offset: u64,
    /// CRC32 (IEEE) of the file bytes; 0 for directories and empty files.
    pub checksum: u32,
    /// Children in build order; always empty for files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Object>,
}

impl Object {
    /// Creates an empty directory object.
    #[must_use]
    pub fn dir(name: impl Into<String>, perm: u32, mod_time: i64) -> Self {
        Self {
            name: name.into(),
            mode_bits: MODE_DIR | (perm & MODE_PERM_MASK),
            mod_time,
            size: 0,
            offset: 0,
            checksum: 0,
            children: Vec::new(),
        }
    }

    /// Creates a file object pointing at `payload[offset..offset + size]`.
    ///
    /// Empty files are normalized to the `offset = checksum = 0` sentinel.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        perm: u32,
        mod_time: i64,
        size: u64,
        offset: u64,
        checksum: u32,
    ) -> Self {
        let (offset, checksum) = if size == 0 { (0, 0) } else { (offset, checksum) };
        Self {
            name: name.into(),
            mode_bits: MODE_FILE | (perm & MODE_PERM_MASK),
            mod_time,
            size,
            offset,
            checksum,
            children: Vec::new(),
        }
    }

    /// Returns `true` if the directory flag is set.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode_bits & MODE_DIR != 0
    }

    /// Finds a direct child by exact name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Number of file objects at or below this node.
    #[must_use]
    pub fn file_count(&self) -> usize {
        if self.is_dir() {
            self.children.iter().map(Self::file_count).sum()
        } else {
            1
        }
    }

    /// Number of directory objects at or below this node, including itself.
    #[must_use]
    pub fn dir_count(&self) -> usize {
        if self.is_dir() {
            1 + self.children.iter().map(Self::dir_count).sum::<usize>()
        } else {
            0
        }
    }

    /// Sum of file sizes at or below this node.
    #[must_use]
    pub fn file_bytes(&self) -> u64 {
        if self.is_dir() {
            self.children.iter().map(Self::file_bytes).sum()
        } else {
            self.size
        }
    }
}

/// Top-level manifest of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Must equal [`MANIFEST_MAGIC`].
    pub magic: String,
    /// Free-form comment written by the generator.
    #[serde(default)]
    pub comment: String,
    /// Build-time options.
    #[serde(default)]
    pub options: BundleOptions,
    /// Root directory, named [`ROOT_NAME`].
    pub root: Object,
}

impl Manifest {
    /// Creates a manifest with the reserved magic and an empty root.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            magic: MANIFEST_MAGIC.to_string(),
            comment: comment.into(),
            options: BundleOptions::default(),
            root: Object::dir(ROOT_NAME, 0o755, 0),
        }
    }

    /// Sum of all file sizes in the tree.
    #[must_use]
    pub fn file_bytes(&self) -> u64 {
        self.root.file_bytes()
    }

    /// Decodes a manifest from its JSON entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) if the
    /// bytes are not a manifest.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes the manifest as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) on
    /// encoder failure.
    pub fn to_vec(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_sentinel() {
        let obj = Object::file("empty", 0o644, 0, 0, 99, 0xdead_beef);
        assert_eq!(obj.offset, 0);
        assert_eq!(obj.checksum, 0);
        assert!(!obj.is_dir());
    }

    #[test]
    fn test_dir_flag() {
        let dir = Object::dir("sub", 0o755, 0);
        assert!(dir.is_dir());
        assert_eq!(dir.mode_bits & MODE_PERM_MASK, 0o755);
    }

    #[test]
    fn test_counts_and_bytes() {
        let mut manifest = Manifest::new("");
        let mut sub = Object::dir("sub", 0o755, 0);
        sub.children.push(Object::file("b.txt", 0o644, 0, 3, 2, 1));
        manifest.root.children.push(Object::file("a.txt", 0o644, 0, 2, 0, 1));
        manifest.root.children.push(sub);

        assert_eq!(manifest.root.file_count(), 2);
        assert_eq!(manifest.root.dir_count(), 2);
        assert_eq!(manifest.file_bytes(), 5);
        assert!(manifest.root.child("sub").is_some());
        assert!(manifest.root.child("SUB").is_none());
    }

    #[test]
    fn test_extraction_mode_serde_names() {
        let json = serde_json::to_string(&ExtractionMode::ExecutableDir).unwrap();
        assert_eq!(json, "\"executable-dir\"");

        let mode: ExtractionMode = serde_json::from_str("\"temp\"").unwrap();
        assert_eq!(mode, ExtractionMode::Temp);
        assert!(!mode.is_supported());

        assert!(serde_json::from_str::<ExtractionMode>("\"disk\"").is_err());
    }

    #[test]
    fn test_manifest_json_roundtrip_preserves_tree() {
        let mut manifest = Manifest::new("comment");
        manifest.options.custom_prefix = "/usr/share/app".to_string();
        manifest.root.children.push(Object::dir("empty-dir", 0o700, 7));

        let bytes = manifest.to_vec().unwrap();
        let decoded = Manifest::from_slice(&bytes).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_from_slice_rejects_garbage() {
        let err = Manifest::from_slice(b"not json").unwrap_err();
        assert!(err.is_schema_mismatch());
    }
}
