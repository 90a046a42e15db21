//! Container codec.
//!
//! A container is a ZIP archive with exactly two stored entries:
//! [`MANIFEST_ENTRY`] (the JSON manifest) and [`ASSETS_ENTRY`] (the raw
//! payload). It either follows the bytes of a host executable or lives next
//! to it as `<base>.cvr`.
//!
//! ZIP records absolute offsets in its central directory. An archive built in
//! memory and then appended to a host file therefore has to be realigned by
//! the host length before any reader will accept it; see [`realign`].
//!
//! # Examples
//!
//! ```
//! use caviar_core::container::{Container, realign};
//! use caviar_core::manifest::Manifest;
//! use std::io::Cursor;
//!
//! let container = Container::new(Manifest::new("doc"), Vec::new());
//! let mut archive = container.encode().unwrap();
//!
//! let host = b"#!host bytes".to_vec();
//! realign(&mut archive, host.len() as u64).unwrap();
//!
//! let mut exe = host;
//! exe.extend_from_slice(&archive);
//!
//! let loaded = Container::from_reader(Cursor::new(exe)).unwrap();
//! assert_eq!(loaded.manifest.comment, "doc");
//! ```

use crate::error::{Error, Result};
use crate::manifest::{ASSETS_ENTRY, BUNDLE_EXTENSION, MANIFEST_ENTRY, Manifest};
use crate::verify::{VerifyReport, verify_manifest};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const EOCD_LEN: usize = 22;
const EOCD_CD_OFFSET: usize = 16;
const EOCD_ENTRIES: usize = 10;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const ZIP64_LOCATOR_LEN: usize = 20;
const CDH_SIGNATURE: u32 = 0x0201_4b50;
const CDH_LEN: usize = 46;
const CDH_NAME_LEN: usize = 28;
const CDH_EXTRA_LEN: usize = 30;
const CDH_COMMENT_LEN: usize = 32;
const CDH_LOCAL_OFFSET: usize = 42;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// Returns the sidecar path for `executable`: its extension replaced by
/// [`BUNDLE_EXTENSION`].
///
/// # Examples
///
/// ```
/// use caviar_core::container::detached_path;
/// use std::path::Path;
///
/// assert_eq!(detached_path(Path::new("/opt/app/tool.exe")), Path::new("/opt/app/tool.cvr"));
/// assert_eq!(detached_path(Path::new("/opt/app/tool")), Path::new("/opt/app/tool.cvr"));
/// ```
#[must_use]
pub fn detached_path(executable: &Path) -> PathBuf {
    executable.with_extension(BUNDLE_EXTENSION)
}

/// A decoded container: manifest plus payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Container {
    /// Metadata tree and options
    pub manifest: Manifest,
    /// Concatenated file bytes
    pub payload: Vec<u8>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("manifest", &self.manifest)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl Container {
    /// Creates a container from its parts.
    #[must_use]
    pub const fn new(manifest: Manifest, payload: Vec<u8>) -> Self {
        Self { manifest, payload }
    }

    /// Opens the container at `path`, either a sidecar or a bundled
    /// executable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContainerNotFound`] if the file cannot be opened or
    /// holds no ZIP archive, and decoding errors otherwise.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = ContainerReader::open(path)?;
        let manifest = reader.manifest()?;
        let payload = reader.payload()?;
        Ok(Self { manifest, payload })
    }

    /// Decodes a container from any seekable reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if no archive is found, and
    /// [`Error::SchemaMismatch`] if an entry is missing or undecodable.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = ContainerReader::new(reader)?;
        let manifest = reader.manifest()?;
        let payload = reader.payload()?;
        Ok(Self { manifest, payload })
    }

    /// Runs the full verifier over this container.
    ///
    /// # Errors
    ///
    /// See [`verify_manifest`].
    pub fn verify(&self) -> Result<VerifyReport> {
        verify_manifest(&self.manifest, &self.payload)
    }

    /// Serializes the container as a standalone archive.
    ///
    /// The result is valid as a sidecar; call [`realign`] before appending
    /// it to other bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] or [`Error::Archive`] on encoder
    /// failure.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let manifest = self.manifest.to_vec()?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(
            manifest.len() + self.payload.len() + 512,
        )));
        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(&manifest)
            .map_err(|e| Error::io(MANIFEST_ENTRY, e))?;
        zip.start_file(ASSETS_ENTRY, options)?;
        zip.write_all(&self.payload)
            .map_err(|e| Error::io(ASSETS_ENTRY, e))?;

        Ok(zip.finish()?.into_inner())
    }
}

/// Two-phase reader: decode the manifest first, load the payload later.
///
/// Lets the loader reject a bundle on its options before reading the
/// (possibly large) payload into memory.
pub struct ContainerReader<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> std::fmt::Debug for ContainerReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerReader")
            .field("entries", &self.archive.len())
            .finish_non_exhaustive()
    }
}

impl ContainerReader<BufReader<File>> {
    /// Opens `path` as a container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContainerNotFound`] if the file is missing or holds
    /// no ZIP archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let not_found = |reason: String| Error::ContainerNotFound {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| not_found(e.to_string()))?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| not_found(e.to_string()))?;
        tracing::debug!(path = %path.display(), entries = archive.len(), "opened container");
        Self::from_archive(archive)
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    /// Wraps a seekable reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if no archive trailer is found.
    pub fn new(reader: R) -> Result<Self> {
        Self::from_archive(ZipArchive::new(reader)?)
    }

    fn from_archive(archive: ZipArchive<R>) -> Result<Self> {
        if archive.len() != 2 {
            return Err(Error::SchemaMismatch {
                reason: format!("container holds {} entries, expected 2", archive.len()),
            });
        }
        Ok(Self { archive })
    }

    /// Decodes the manifest entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the entry is missing or is not a
    /// manifest.
    pub fn manifest(&mut self) -> Result<Manifest> {
        let bytes = self.read_entry(MANIFEST_ENTRY)?;
        Manifest::from_slice(&bytes)
    }

    /// Reads the whole payload entry into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the entry is missing or
    /// compressed.
    pub fn payload(&mut self) -> Result<Vec<u8>> {
        self.read_entry(ASSETS_ENTRY)
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .archive
            .index_for_name(name)
            .ok_or_else(|| Error::SchemaMismatch {
                reason: format!("container is missing the {name} entry"),
            })?;

        // Raw access skips the archive-level CRC; per-object checksums in the
        // manifest are what the verifier trusts.
        let mut entry = self.archive.by_index_raw(index)?;
        if entry.compression() != CompressionMethod::Stored {
            return Err(Error::SchemaMismatch {
                reason: format!("container entry {name} must be stored uncompressed"),
            });
        }

        let capacity = usize::try_from(entry.size()).unwrap_or(0);
        let mut bytes = Vec::with_capacity(capacity);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| Error::io(name, e))?;
        Ok(bytes)
    }
}

/// Shifts every absolute offset in `archive` by `prefix_len`.
///
/// `archive` must be a complete, standalone ZIP archive (as produced by
/// [`Container::encode`]) that is about to be written after `prefix_len`
/// bytes of host data. Each central-directory header's local-header offset
/// and the end-of-central-directory "start of central directory" field are
/// rewritten in place.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the trailer cannot be parsed, the archive
/// uses Zip64, or a shifted offset no longer fits in 32 bits.
pub fn realign(archive: &mut [u8], prefix_len: u64) -> Result<()> {
    if prefix_len == 0 {
        return Ok(());
    }

    let eocd = find_eocd(archive)?;
    if eocd >= ZIP64_LOCATOR_LEN
        && read_u32(archive, eocd - ZIP64_LOCATOR_LEN)? == ZIP64_LOCATOR_SIGNATURE
    {
        return Err(invalid("Zip64 archives cannot be realigned"));
    }

    let entries = read_u16(archive, eocd + EOCD_ENTRIES)?;
    let cd_offset = read_u32(archive, eocd + EOCD_CD_OFFSET)?;
    write_u32(archive, eocd + EOCD_CD_OFFSET, shift(cd_offset, prefix_len)?)?;

    let mut pos = usize::try_from(cd_offset)
        .map_err(|_| invalid("central directory offset overflows"))?;
    for _ in 0..entries {
        if read_u32(archive, pos)? != CDH_SIGNATURE {
            return Err(invalid("bad central directory header signature"));
        }
        let local = read_u32(archive, pos + CDH_LOCAL_OFFSET)?;
        write_u32(archive, pos + CDH_LOCAL_OFFSET, shift(local, prefix_len)?)?;

        let name_len = usize::from(read_u16(archive, pos + CDH_NAME_LEN)?);
        let extra_len = usize::from(read_u16(archive, pos + CDH_EXTRA_LEN)?);
        let comment_len = usize::from(read_u16(archive, pos + CDH_COMMENT_LEN)?);
        pos += CDH_LEN + name_len + extra_len + comment_len;
    }

    tracing::debug!(prefix_len, entries, "realigned archive offsets");
    Ok(())
}

fn find_eocd(archive: &[u8]) -> Result<usize> {
    if archive.len() < EOCD_LEN {
        return Err(invalid("archive is shorter than its trailer"));
    }
    let last = archive.len() - EOCD_LEN;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    (first..=last)
        .rev()
        .find(|&i| archive[i..i + 4] == EOCD_SIGNATURE.to_le_bytes())
        .ok_or_else(|| invalid("end of central directory record not found"))
}

fn shift(offset: u32, prefix_len: u64) -> Result<u32> {
    if offset == u32::MAX {
        return Err(invalid("Zip64 offsets cannot be realigned"));
    }
    u32::try_from(u64::from(offset) + prefix_len)
        .map_err(|_| invalid("realigned offset does not fit in 32 bits"))
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16> {
    buf.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| invalid("truncated central directory"))
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32> {
    buf.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| invalid("truncated central directory"))
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) -> Result<()> {
    buf.get_mut(at..at + 4)
        .ok_or_else(|| invalid("truncated central directory"))?
        .copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn invalid(reason: &str) -> Error {
    Error::Archive(ZipError::Io(io::Error::new(io::ErrorKind::InvalidData, reason)))
}
