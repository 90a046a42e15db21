//! Loaded bundle and its file-handle operations.
//!
//! A [`Runtime`] owns the verified payload, the directory tree, and the
//! handle table. Everything except the handle table is immutable after
//! construction, so reads need the table lock only long enough to move a
//! cursor.
//!
//! # Examples
//!
//! ```
//! use caviar_core::checksum::calculate_checksum;
//! use caviar_core::{Container, Manifest, Object};
//! use caviar_vfs::{Runtime, RuntimeConfig};
//! use std::path::Path;
//!
//! let mut manifest = Manifest::new("");
//! manifest.root.children.push(Object::file("a.txt", 0o644, 0, 2, 0, calculate_checksum(b"hi")));
//! let container = Container::new(manifest, b"hi".to_vec());
//!
//! let rt = Runtime::new(container, Path::new("/opt/app"), &RuntimeConfig::default()).unwrap();
//! let fd = rt.open("/opt/app/a.txt").unwrap();
//!
//! let mut buf = [0u8; 8];
//! assert_eq!(rt.read(fd, &mut buf).unwrap(), 2);
//! assert_eq!(&buf[..2], b"hi");
//! assert_eq!(rt.read(fd, &mut buf).unwrap(), 0);
//! rt.close(fd).unwrap();
//! ```

use crate::config::RuntimeConfig;
use crate::handles::{Cursor, Handle, HandleTable};
use crate::tree::{Node, NodeId, NodeKind, Resolution, Tree};
use crate::types::{DirBatch, Fd, FileInfo, WalkEntry};
use caviar_core::{BundleOptions, Container, Error, Result, VerifyReport};
use parking_lot::Mutex;
use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

/// A verified, memory-resident bundle.
///
/// # Thread Safety
///
/// `Runtime` is `Send + Sync`. Every handle operation takes one short-lived
/// lock on the handle table; the payload and tree are shared without
/// synchronization.
pub struct Runtime {
    comment: String,
    options: BundleOptions,
    payload: Vec<u8>,
    tree: Tree,
    handles: Mutex<HandleTable>,
    read_chunk: usize,
    debug: bool,
    report: VerifyReport,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("prefix", &self.tree.prefix())
            .field("nodes", &self.tree.len())
            .field("payload_len", &self.payload.len())
            .field("open_handles", &self.open_count())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Verifies `container` and builds the runtime around it.
    ///
    /// The virtual root is, in order of precedence: `config.prefix`, the
    /// bundle's `custom_prefix` (relative values are taken from
    /// `default_prefix`), then `default_prefix` itself. A relative result is
    /// made absolute against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOption`] for an invalid `config`, any
    /// verification error from [`Container::verify`], and [`Error::Io`] if a
    /// relative prefix cannot be made absolute.
    pub fn new(
        container: Container,
        default_prefix: &Path,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        config.validate().map_err(|reason| Error::UnsupportedOption {
            option: "runtime config".to_string(),
            reason,
        })?;

        let report = container.verify()?;
        let Container { manifest, payload } = container;

        let prefix = config.prefix.clone().unwrap_or_else(|| {
            if manifest.options.custom_prefix.is_empty() {
                default_prefix.to_path_buf()
            } else {
                default_prefix.join(&manifest.options.custom_prefix)
            }
        });
        let prefix = std::path::absolute(&prefix).map_err(|e| Error::io(&prefix, e))?;
        let debug = config.debug.unwrap_or(manifest.options.debug);
        let tree = Tree::build(&manifest.root, &prefix, config.match_policy);

        tracing::info!(
            prefix = %tree.prefix().display(),
            files = report.files,
            directories = report.directories,
            bytes = report.bytes,
            "caviar bundle loaded"
        );

        Ok(Self {
            comment: manifest.comment,
            options: manifest.options,
            payload,
            tree,
            handles: Mutex::new(HandleTable::new()),
            read_chunk: config.read_chunk,
            debug,
            report,
        })
    }

    /// The virtual root under which bundled paths resolve.
    #[must_use]
    pub fn prefix(&self) -> &Path {
        self.tree.prefix()
    }

    /// Comment recorded by the bundle generator.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Options recorded at build time.
    #[must_use]
    pub const fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// Whether internal errors are being logged.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Totals from load-time verification.
    #[must_use]
    pub const fn report(&self) -> VerifyReport {
        self.report
    }

    /// The directory tree.
    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Number of handles currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.handles.lock().open_count()
    }

    /// Resolves a path against the virtual root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for missing entries under the virtual root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<Resolution> {
        self.logged("resolve", self.tree.resolve(path.as_ref()))
    }

    /// Opens a bundled file or directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is missing or outside the
    /// virtual root; the caller decides whether to fall back to the real
    /// filesystem.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Fd> {
        let path = path.as_ref();
        let result = self.lookup(path).map(|id| {
            let cursor = if self.tree.node(id).is_dir() {
                Cursor::Dir { next: 0 }
            } else {
                Cursor::File { pos: 0 }
            };
            self.handles.lock().allocate(Handle { node: id, cursor })
        });
        self.logged("open", result)
    }

    /// Closes a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if `fd` is unknown or already
    /// closed.
    pub fn close(&self, fd: Fd) -> Result<()> {
        self.logged("close", self.handles.lock().release(fd).map(|_| ()))
    }

    /// Reads from the cursor, advancing it.
    ///
    /// Copies at most `min(buf.len(), read chunk, bytes left)` bytes and
    /// returns `Ok(0)` at end of file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for directories and closed
    /// handles.
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let result = self.with_handle(fd, "read", |handle, node| {
            match (&node.kind, &mut handle.cursor) {
                (&NodeKind::File { offset, size }, Cursor::File { pos }) => {
                    let n = self.copy_out(offset, size, *pos, buf)?;
                    *pos += n as u64;
                    Ok(n)
                }
                _ => Err(Error::invalid("read", "cannot read directory as data")),
            }
        });
        self.logged("read", result)
    }

    /// Reads at an absolute offset without moving the cursor.
    ///
    /// Returns `Ok(0)` when `offset` is at or past end of file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for directories and closed
    /// handles.
    pub fn read_at(&self, fd: Fd, buf: &mut [u8], offset: u64) -> Result<usize> {
        let result = self.with_handle(fd, "read_at", |_, node| match node.kind {
            NodeKind::File {
                offset: start,
                size,
            } => self.copy_out(start, size, offset, buf),
            NodeKind::Dir { .. } => Err(Error::invalid("read_at", "cannot read directory as data")),
        });
        self.logged("read_at", result)
    }

    /// Moves the cursor of a file handle and returns the new position.
    ///
    /// Positions before 0 or past the end of file are rejected and leave the
    /// cursor unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for out-of-range targets,
    /// directories, and closed handles.
    pub fn seek(&self, fd: Fd, target: SeekFrom) -> Result<u64> {
        let result = self.with_handle(fd, "seek", |handle, node| {
            let (&NodeKind::File { size, .. }, Cursor::File { pos }) =
                (&node.kind, &mut handle.cursor)
            else {
                return Err(Error::invalid("seek", "cannot seek a directory"));
            };

            let candidate = match target {
                SeekFrom::Start(n) => i128::from(n),
                SeekFrom::Current(delta) => i128::from(*pos) + i128::from(delta),
                SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
            };
            let new = u64::try_from(candidate)
                .ok()
                .filter(|&p| p <= size)
                .ok_or_else(|| {
                    Error::invalid("seek", format!("position {candidate} is outside 0..={size}"))
                })?;
            *pos = new;
            Ok(new)
        });
        self.logged("seek", result)
    }

    /// Lists up to `n` entries of a directory handle from its cursor.
    ///
    /// With `n == 0` every remaining entry is returned and an empty result
    /// is not end-of-stream. With `n > 0` and nothing left the result is
    /// [`DirBatch::End`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for files and closed handles.
    pub fn readdir(&self, fd: Fd, n: usize) -> Result<DirBatch<FileInfo>> {
        let result = self.next_children(fd, n, "readdir").map(|batch| match batch {
            DirBatch::Entries(ids) => {
                DirBatch::Entries(ids.into_iter().map(|id| self.tree.node(id).info()).collect())
            }
            DirBatch::End => DirBatch::End,
        });
        self.logged("readdir", result)
    }

    /// Like [`readdir`](Self::readdir) but returns names only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for files and closed handles.
    pub fn readdirnames(&self, fd: Fd, n: usize) -> Result<DirBatch<String>> {
        let result = self
            .next_children(fd, n, "readdirnames")
            .map(|batch| match batch {
                DirBatch::Entries(ids) => DirBatch::Entries(
                    ids.into_iter()
                        .map(|id| self.tree.node(id).name.clone())
                        .collect(),
                ),
                DirBatch::End => DirBatch::End,
            });
        self.logged("readdirnames", result)
    }

    /// Metadata of an open handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for closed handles.
    pub fn stat(&self, fd: Fd) -> Result<FileInfo> {
        self.logged("stat", self.with_handle(fd, "stat", |_, node| Ok(node.info())))
    }

    /// Metadata of a bundled path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is missing or outside the
    /// virtual root.
    pub fn stat_path(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let result = self
            .lookup(path.as_ref())
            .map(|id| self.tree.node(id).info());
        self.logged("stat", result)
    }

    /// Name of the entry behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for closed handles.
    pub fn name(&self, fd: Fd) -> Result<String> {
        self.logged("name", self.with_handle(fd, "name", |_, node| Ok(node.name.clone())))
    }

    /// Depth-first listing of `path` and everything below it.
    ///
    /// Directories precede their children; siblings keep build order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is missing or outside the
    /// virtual root.
    pub fn walk(&self, path: impl AsRef<Path>) -> Result<Vec<WalkEntry>> {
        let result = self.lookup(path.as_ref()).map(|start| {
            let mut entries = Vec::new();
            let mut stack = vec![(start, self.tree.path_of(start))];
            while let Some((id, path)) = stack.pop() {
                for &child in self.tree.children(id).iter().rev() {
                    stack.push((child, path.join(&self.tree.node(child).name)));
                }
                entries.push(WalkEntry {
                    path,
                    info: self.tree.node(id).info(),
                });
            }
            entries
        });
        self.logged("walk", result)
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn write(&self, _fd: Fd, _buf: &[u8]) -> Result<usize> {
        self.logged("write", Err(Error::read_only("write")))
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn write_at(&self, _fd: Fd, _buf: &[u8], _offset: u64) -> Result<usize> {
        self.logged("write_at", Err(Error::read_only("write_at")))
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn truncate(&self, _fd: Fd, _size: u64) -> Result<()> {
        self.logged("truncate", Err(Error::read_only("truncate")))
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn chmod(&self, _fd: Fd, _mode: u32) -> Result<()> {
        self.logged("chmod", Err(Error::read_only("chmod")))
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn chown(&self, _fd: Fd, _uid: u32, _gid: u32) -> Result<()> {
        self.logged("chown", Err(Error::read_only("chown")))
    }

    /// Always fails: bundled files are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::ReadOnly`].
    pub fn sync(&self, _fd: Fd) -> Result<()> {
        self.logged("sync", Err(Error::read_only("sync")))
    }

    /// Resolves to a node; outside the virtual root is `NotFound`.
    fn lookup(&self, path: &Path) -> Result<NodeId> {
        match self.tree.resolve(path)? {
            Resolution::Node(id) => Ok(id),
            Resolution::Outside => Err(Error::NotFound {
                path: path.display().to_string(),
            }),
        }
    }

    fn with_handle<T>(
        &self,
        fd: Fd,
        operation: &str,
        f: impl FnOnce(&mut Handle, &Node) -> Result<T>,
    ) -> Result<T> {
        let mut table = self.handles.lock();
        let handle = table.get_mut(fd, operation)?;
        let node = self.tree.node(handle.node);
        f(handle, node)
    }

    fn next_children(&self, fd: Fd, n: usize, operation: &str) -> Result<DirBatch<NodeId>> {
        self.with_handle(fd, operation, |handle, node| {
            let (NodeKind::Dir { children }, Cursor::Dir { next }) =
                (&node.kind, &mut handle.cursor)
            else {
                return Err(Error::invalid(operation, "not a directory"));
            };

            let remaining = children.get(*next..).unwrap_or_default();
            if n > 0 && remaining.is_empty() {
                return Ok(DirBatch::End);
            }
            let take = if n == 0 {
                remaining.len()
            } else {
                n.min(remaining.len())
            };
            let batch = remaining[..take].to_vec();
            *next += take;
            Ok(DirBatch::Entries(batch))
        })
    }

    /// Copies file bytes starting `at` bytes into the file.
    fn copy_out(&self, offset: u64, size: u64, at: u64, buf: &mut [u8]) -> Result<usize> {
        if at >= size {
            return Ok(0);
        }
        let cap = buf.len().min(self.read_chunk);
        let n = usize::try_from(size - at).map_or(cap, |left| left.min(cap));
        let start = usize::try_from(offset + at)
            .map_err(|_| Error::invalid("read", "offset exceeds address space"))?;

        let src = self
            .payload
            .get(start..start + n)
            .ok_or_else(|| Error::invalid("read", "range outside payload"))?;
        buf[..n].copy_from_slice(src);
        Ok(n)
    }

    fn logged<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if self.debug
            && let Err(err) = &result
        {
            tracing::debug!(operation, error = %err, "caviar call failed");
        }
        result
    }
}
