//! `std::fs`-shaped access to bundled files.
//!
//! [`EmbeddedFile`] adapts a handle to [`Read`] and [`Seek`]. The free
//! functions ([`open`], [`read`], [`read_to_string`], [`read_dir`],
//! [`metadata`]) consult the process-wide runtime first and fall back to the
//! real filesystem when the path is outside the virtual root, missing from
//! the bundle, or no bundle is loaded.

use crate::bootstrap::ensure_init;
use crate::runtime::Runtime;
use crate::types::{DirBatch, Fd, FileInfo};
use caviar_core::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// An open bundled file or directory.
///
/// The handle is closed on drop; [`close`](Self::close) closes it early and
/// reports a second close as an error.
#[derive(Debug)]
pub struct EmbeddedFile<'rt> {
    runtime: &'rt Runtime,
    fd: Option<Fd>,
}

impl Runtime {
    /// Opens `path` as an [`EmbeddedFile`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is missing or outside the
    /// virtual root.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<EmbeddedFile<'_>> {
        let fd = self.open(path)?;
        Ok(EmbeddedFile {
            runtime: self,
            fd: Some(fd),
        })
    }
}

impl EmbeddedFile<'_> {
    fn fd(&self, operation: &str) -> Result<Fd> {
        self.fd
            .ok_or_else(|| Error::invalid(operation, "file is already closed"))
    }

    /// The raw handle, while open.
    #[must_use]
    pub const fn raw_fd(&self) -> Option<Fd> {
        self.fd
    }

    /// Closes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if the file was already closed.
    pub fn close(&mut self) -> Result<()> {
        let fd = self.fd("close")?;
        self.fd = None;
        self.runtime.close(fd)
    }

    /// Metadata of the open entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if the file is closed.
    pub fn metadata(&self) -> Result<FileInfo> {
        self.runtime.stat(self.fd("stat")?)
    }

    /// Reads without moving the cursor. See [`Runtime::read_at`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for directories or a closed file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.runtime.read_at(self.fd("read_at")?, buf, offset)
    }

    /// Lists directory entries. See [`Runtime::readdir`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for files or a closed file.
    pub fn readdir(&self, n: usize) -> Result<DirBatch<FileInfo>> {
        self.runtime.readdir(self.fd("readdir")?, n)
    }

    /// Lists directory entry names. See [`Runtime::readdirnames`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for files or a closed file.
    pub fn readdirnames(&self, n: usize) -> Result<DirBatch<String>> {
        self.runtime.readdirnames(self.fd("readdirnames")?, n)
    }
}

impl Read for EmbeddedFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.runtime.read(self.fd("read")?, buf)?)
    }
}

impl Seek for EmbeddedFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.runtime.seek(self.fd("seek")?, pos)?)
    }
}

impl Write for EmbeddedFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.runtime.write(self.fd("write")?, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.runtime.sync(self.fd("flush")?)?)
    }
}

impl Drop for EmbeddedFile<'_> {
    fn drop(&mut self) {
        if let Some(fd) = self.fd.take() {
            let _ = self.runtime.close(fd);
        }
    }
}

/// A file opened through [`open`]: bundled, or from the real filesystem.
#[derive(Debug)]
pub enum AnyFile {
    /// Served from the bundle
    Embedded(EmbeddedFile<'static>),
    /// Served from disk
    Native(File),
}

impl AnyFile {
    /// Returns `true` if the file comes from the bundle.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

impl Read for AnyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Embedded(f) => f.read(buf),
            Self::Native(f) => f.read(buf),
        }
    }
}

impl Seek for AnyFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Embedded(f) => f.seek(pos),
            Self::Native(f) => f.seek(pos),
        }
    }
}

impl Write for AnyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Embedded(f) => f.write(buf),
            Self::Native(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Embedded(f) => f.flush(),
            Self::Native(f) => f.flush(),
        }
    }
}

/// The process-wide runtime if `path` should be served from it.
///
/// `None` means "use the real filesystem": no bundle is loaded, the path is
/// outside the virtual root, or the bundle lacks it.
fn bundled(path: &Path) -> Option<&'static Runtime> {
    let rt = ensure_init().ok()?;
    match rt.stat_path(path) {
        Ok(_) => Some(rt),
        Err(err) => {
            if rt.is_debug() {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "falling back to real filesystem"
                );
            }
            None
        }
    }
}

/// Opens a file from the bundle, or from disk when the bundle cannot serve
/// it.
///
/// # Errors
///
/// Returns the real filesystem's error when falling back.
pub fn open(path: impl AsRef<Path>) -> io::Result<AnyFile> {
    let path = path.as_ref();
    match bundled(path) {
        Some(rt) => Ok(AnyFile::Embedded(rt.open_file(path)?)),
        None => File::open(path).map(AnyFile::Native),
    }
}

/// Reads a whole file, like [`std::fs::read`].
///
/// # Errors
///
/// Returns an error for bundled directories, or the real filesystem's error
/// when falling back.
pub fn read(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    let path = path.as_ref();
    let Some(rt) = bundled(path) else {
        return std::fs::read(path);
    };
    read_embedded(rt, path)
}

/// Reads a whole file as UTF-8, like [`std::fs::read_to_string`].
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidData`] if the contents are not UTF-8.
pub fn read_to_string(path: impl AsRef<Path>) -> io::Result<String> {
    let bytes = read(path)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Lists a directory, like [`std::fs::read_dir`] but collected.
///
/// # Errors
///
/// Returns an error for bundled files, or the real filesystem's error when
/// falling back.
pub fn read_dir(path: impl AsRef<Path>) -> io::Result<Vec<FileInfo>> {
    let path = path.as_ref();
    if let Some(rt) = bundled(path) {
        let dir = rt.open_file(path)?;
        return Ok(dir.readdir(0)?.into_vec());
    }

    std::fs::read_dir(path)?
        .map(|entry| {
            let entry = entry?;
            let meta = entry.metadata()?;
            Ok(FileInfo::from_native(
                entry.file_name().to_string_lossy(),
                &meta,
            ))
        })
        .collect()
}

/// Metadata of a path, like [`std::fs::metadata`].
///
/// # Errors
///
/// Returns the real filesystem's error when falling back.
pub fn metadata(path: impl AsRef<Path>) -> io::Result<FileInfo> {
    let path = path.as_ref();
    if let Some(rt) = bundled(path) {
        return Ok(rt.stat_path(path)?);
    }
    let meta = std::fs::metadata(path)?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(FileInfo::from_native(name, &meta))
}

/// Reads a whole bundled file through a handle.
///
/// # Errors
///
/// Returns an error if `path` is missing or a directory.
pub fn read_embedded(rt: &Runtime, path: &Path) -> io::Result<Vec<u8>> {
    let mut file = rt.open_file(path)?;
    let size = file.metadata()?.size;
    let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    file.read_to_end(&mut buf)?;
    file.close()?;
    Ok(buf)
}
