//! Bundle builder.
//!
//! Walks asset sources into a manifest and a payload, encodes the container,
//! and writes it either after the target executable or next to it.
//!
//! Output is staged in a temporary file in the destination directory and
//! renamed into place, so a failed build never leaves a partial container.
//!
//! # Examples
//!
//! ```no_run
//! use caviar_bundler::BundleBuilder;
//!
//! let report = BundleBuilder::new()
//!     .add_source("assets")
//!     .cherrypick(true)
//!     .build("target/release/myapp")?;
//!
//! println!("bundled {} files into {}", report.files, report.output.display());
//! # Ok::<(), caviar_core::Error>(())
//! ```

use caviar_core::checksum::calculate_checksum;
use caviar_core::{BundleOptions, Container, Error, Manifest, Object, Result, detached_path, realign};
use chrono::{DateTime, Utc};
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// File that now carries the container
    pub output: PathBuf,
    /// `true` for a sidecar, `false` for an appended container
    pub detached: bool,
    /// Number of bundled files
    pub files: usize,
    /// Number of bundled directories, root included
    pub directories: usize,
    /// Payload length in bytes
    pub payload_bytes: u64,
    /// Encoded archive length in bytes
    pub archive_bytes: u64,
}

/// Builder for Caviar bundles.
///
/// # Examples
///
/// ```
/// use caviar_bundler::BundleBuilder;
/// use std::fs;
///
/// let dir = tempfile::tempdir()?;
/// fs::write(dir.path().join("a.txt"), "hi")?;
///
/// let container = BundleBuilder::new().add_source(dir.path()).assemble()?;
/// assert!(container.manifest.root.child("a.txt").is_some());
/// assert_eq!(container.payload, b"hi");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    sources: Vec<PathBuf>,
    cherrypick: bool,
    detached: bool,
    options: BundleOptions,
    comment: String,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    /// Creates a builder with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cherrypick: false,
            detached: false,
            options: BundleOptions::default(),
            comment: format!("caviar-bundler {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Adds an asset source: a directory, or a single file.
    #[must_use]
    pub fn add_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Adds several asset sources.
    #[must_use]
    pub fn add_sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Keeps each source directory as a named subdirectory instead of
    /// merging its contents into the bundle root.
    #[must_use]
    pub const fn cherrypick(mut self, cherrypick: bool) -> Self {
        self.cherrypick = cherrypick;
        self
    }

    /// Writes a `.cvr` sidecar instead of appending to the executable.
    #[must_use]
    pub const fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// Fixes the runtime virtual root.
    #[must_use]
    pub fn custom_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.custom_prefix = prefix.into();
        self
    }

    /// Turns on runtime debug logging.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Replaces the generator comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Walks every source into a manifest and payload.
    ///
    /// Sources are walked in order, entries sorted by file name. Symbolic
    /// links and other non-regular files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a source cannot be read,
    /// [`Error::DuplicateEntry`] if two entries land on the same name, and
    /// [`Error::InvalidOperation`] if no sources were given.
    pub fn assemble(&self) -> Result<Container> {
        if self.sources.is_empty() {
            return Err(Error::invalid(
                "bundle",
                "at least one asset source is required",
            ));
        }

        let mut manifest = Manifest::new(self.comment.clone());
        manifest.options = self.options.clone();
        let mut payload = Vec::new();

        for source in &self.sources {
            walk_source(&mut manifest.root, &mut payload, source, self.cherrypick)?;
        }

        tracing::debug!(
            files = manifest.root.file_count(),
            payload_bytes = payload.len(),
            "assembled bundle"
        );
        Ok(Container::new(manifest, payload))
    }

    /// Assembles the bundle and attaches it to `executable`.
    ///
    /// Appended builds copy the executable, add the realigned archive, and
    /// replace the original with the same permissions. Detached builds write
    /// `<executable without extension>.cvr` next to it.
    ///
    /// # Errors
    ///
    /// Returns any [`assemble`](Self::assemble) error, and [`Error::Io`] or
    /// [`Error::Archive`] if the output cannot be produced.
    pub fn build(&self, executable: impl AsRef<Path>) -> Result<BuildReport> {
        let executable = executable.as_ref();
        let container = self.assemble()?;
        let mut archive = container.encode()?;

        let output = if self.detached {
            let sidecar = detached_path(executable);
            write_atomic(&sidecar, None, |out| out.write_all(&archive))?;
            sidecar
        } else {
            let meta = fs::metadata(executable).map_err(|e| Error::io(executable, e))?;
            realign(&mut archive, meta.len())?;

            let mut host = File::open(executable).map_err(|e| Error::io(executable, e))?;
            write_atomic(executable, Some(meta.permissions()), |out| {
                io::copy(&mut host, out)?;
                out.write_all(&archive)
            })?;
            executable.to_path_buf()
        };

        let report = BuildReport {
            output,
            detached: self.detached,
            files: container.manifest.root.file_count(),
            directories: container.manifest.root.dir_count(),
            payload_bytes: container.payload.len() as u64,
            archive_bytes: archive.len() as u64,
        };
        tracing::info!(
            output = %report.output.display(),
            detached = report.detached,
            files = report.files,
            payload_bytes = report.payload_bytes,
            "bundle written"
        );
        Ok(report)
    }
}

fn walk_source(root: &mut Object, payload: &mut Vec<u8>, source: &Path, cherrypick: bool) -> Result<()> {
    // The root itself may be a symlink; entries below it are not followed.
    let meta = fs::metadata(source).map_err(|e| Error::io(source, e))?;

    if meta.is_file() {
        let name = file_name(source)?;
        let entry_path = name.clone();
        return add_file(root, payload, source, name, &meta, &entry_path);
    }
    if !meta.is_dir() {
        tracing::warn!(path = %source.display(), "skipping non-regular source");
        return Ok(());
    }

    let mut base = Vec::new();
    if cherrypick {
        let canonical = fs::canonicalize(source).map_err(|e| Error::io(source, e))?;
        let name = file_name(&canonical)?;
        if root.child(&name).is_some() {
            return Err(Error::DuplicateEntry { path: name });
        }
        find_or_create_dir(root, &[], &name, &meta)?;
        tracing::debug!(dir = %name, "cherry-picked source directory");
        base.push(name);
    }

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::io(path, io::Error::from(e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| Error::invalid("bundle", "walked outside the source root"))?;

        let mut segments = base.clone();
        for component in relative.components() {
            segments.push(component.as_os_str().to_string_lossy().into_owned());
        }
        let Some((name, parents)) = segments.split_last() else {
            continue;
        };
        let entry_path = segments.join("/");

        let file_type = entry.file_type();
        if file_type.is_symlink() || !(file_type.is_dir() || file_type.is_file()) {
            tracing::warn!(path = %entry.path().display(), "skipping symlink or special file");
            continue;
        }

        let meta = entry
            .metadata()
            .map_err(|e| Error::io(entry.path(), io::Error::from(e)))?;
        if file_type.is_dir() {
            find_or_create_dir(root, parents, name, &meta)?;
        } else {
            let parent = dir_at(root, parents, &entry_path)?;
            add_file(parent, payload, entry.path(), name.clone(), &meta, &entry_path)?;
        }
    }
    Ok(())
}

fn add_file(
    parent: &mut Object,
    payload: &mut Vec<u8>,
    path: &Path,
    name: String,
    meta: &Metadata,
    entry_path: &str,
) -> Result<()> {
    if parent.child(&name).is_some() {
        return Err(Error::DuplicateEntry {
            path: entry_path.to_string(),
        });
    }

    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let offset = payload.len() as u64;
    let checksum = calculate_checksum(&bytes);
    payload.extend_from_slice(&bytes);

    tracing::debug!(path = entry_path, size = bytes.len(), offset, "bundled file");
    parent.children.push(Object::file(
        name,
        permissions(meta),
        mod_time(meta),
        bytes.len() as u64,
        offset,
        checksum,
    ));
    Ok(())
}

/// Walks the directory chain `segments`, which must already exist.
fn dir_at<'a>(root: &'a mut Object, segments: &[String], display: &str) -> Result<&'a mut Object> {
    let mut node = root;
    for segment in segments {
        let idx = node
            .children
            .iter()
            .position(|c| c.name == *segment && c.is_dir())
            .ok_or_else(|| Error::DuplicateEntry {
                path: display.to_string(),
            })?;
        node = &mut node.children[idx];
    }
    Ok(node)
}

/// Returns the directory `name` under `parents`, creating it if absent.
///
/// Directories of the same name from different sources merge; a file of
/// that name is a clash.
fn find_or_create_dir<'a>(
    root: &'a mut Object,
    parents: &[String],
    name: &str,
    meta: &Metadata,
) -> Result<&'a mut Object> {
    let mut path = parents.to_vec();
    path.push(name.to_string());
    let display = path.join("/");

    let parent = dir_at(root, parents, &display)?;
    let idx = match parent.children.iter().position(|c| c.name == name) {
        Some(idx) if parent.children[idx].is_dir() => idx,
        Some(_) => return Err(Error::DuplicateEntry { path: display }),
        None => {
            parent
                .children
                .push(Object::dir(name, permissions(meta), mod_time(meta)));
            parent.children.len() - 1
        }
    };
    Ok(&mut parent.children[idx])
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::invalid("bundle", format!("source {} has no name", path.display())))
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permissions(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, true) => 0o555,
        (true, false) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

fn mod_time(meta: &Metadata) -> i64 {
    meta.modified()
        .map_or(0, |t| DateTime::<Utc>::from(t).timestamp())
}

/// Writes `dest` through a temporary file in the same directory.
fn write_atomic(
    dest: &Path,
    permissions: Option<fs::Permissions>,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;

    write(tmp.as_file_mut()).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions).map_err(|e| Error::io(tmp.path(), e))?;
    }

    tmp.persist(dest).map_err(|e| Error::io(dest, e.error))?;
    Ok(())
}
