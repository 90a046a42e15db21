//! One-shot runtime loading.
//!
//! A [`Bootstrap`] runs the load sequence at most once:
//!
//! 1. locate the container (the running executable, then its `.cvr` sidecar)
//! 2. decode the manifest and reject unsupported options
//! 3. load the payload, verify it, build the tree
//!
//! The outcome is cached. A failed load is permanent: every later call
//! reports [`Error::NotReady`] instead of retrying.
//!
//! The process-wide instance behind [`init`] and [`runtime`] is a `static`.
//! Rust has no code that runs before `main`, so the std-shaped helpers call
//! [`ensure_init`], which performs the same load lazily on first use.
//! Tests construct their own `Bootstrap` for isolation.

use crate::config::RuntimeConfig;
use crate::runtime::Runtime;
use caviar_core::{Container, ContainerReader, Error, Result, detached_path};
use once_cell::sync::OnceCell;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

/// Where to load a container from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerSource {
    /// The running executable, falling back to its sidecar.
    ///
    /// The virtual root defaults to the executable's directory.
    CurrentExe,
    /// A specific bundled executable or sidecar file.
    ///
    /// The virtual root defaults to the file's directory.
    Path(PathBuf),
    /// An in-memory container.
    Bytes {
        /// Encoded archive
        bytes: Vec<u8>,
        /// Virtual root when neither the bundle nor the config sets one
        default_prefix: PathBuf,
    },
}

enum State {
    Ready(Runtime),
    Failed(String),
}

/// Process-wide load guard.
///
/// # Examples
///
/// ```
/// use caviar_core::{Container, Manifest};
/// use caviar_vfs::{Bootstrap, ContainerSource, RuntimeConfig};
///
/// let bytes = Container::new(Manifest::new(""), Vec::new()).encode().unwrap();
/// let boot = Bootstrap::new();
/// let source = ContainerSource::Bytes { bytes, default_prefix: "/opt/app".into() };
///
/// boot.init_with(source.clone(), &RuntimeConfig::default()).unwrap();
/// assert!(boot.is_ready());
/// assert!(boot.init_with(source, &RuntimeConfig::default()).unwrap_err().is_already_initialized());
/// ```
pub struct Bootstrap {
    cell: OnceCell<State>,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.cell.get() {
            None => "uninitialized",
            Some(State::Ready(_)) => "ready",
            Some(State::Failed(_)) => "failed",
        };
        f.debug_struct("Bootstrap").field("state", &state).finish()
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    /// Creates an uninitialized bootstrap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Loads the bundle attached to the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on any call after the first,
    /// and the load error on a failed first call.
    pub fn init(&self) -> Result<&Runtime> {
        self.init_with(ContainerSource::CurrentExe, &RuntimeConfig::default())
    }

    /// Loads a bundle from `source` with `config` overrides.
    ///
    /// Only the first call on a bootstrap does any work; later calls return
    /// [`Error::AlreadyInitialized`] and leave the stored state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] if a load was already attempted,
    /// otherwise whatever the load sequence failed with.
    pub fn init_with(&self, source: ContainerSource, config: &RuntimeConfig) -> Result<&Runtime> {
        let mut ran = false;
        let mut failure = None;
        let state = self.cell.get_or_init(|| {
            ran = true;
            match load(source, config) {
                Ok(rt) => State::Ready(rt),
                Err(err) => {
                    tracing::warn!(error = %err, "caviar bundle failed to load");
                    let reason = err.to_string();
                    failure = Some(err);
                    State::Failed(reason)
                }
            }
        });

        if !ran {
            return Err(Error::AlreadyInitialized);
        }
        if let Some(err) = failure {
            return Err(err);
        }
        match state {
            State::Ready(rt) => Ok(rt),
            State::Failed(reason) => Err(Error::NotReady {
                reason: reason.clone(),
            }),
        }
    }

    /// Returns the runtime, loading from the running executable if no load
    /// was attempted yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if loading failed, now or earlier.
    pub fn ensure_init(&self) -> Result<&Runtime> {
        self.cell.get_or_init(|| {
            match load(ContainerSource::CurrentExe, &RuntimeConfig::default()) {
                Ok(rt) => State::Ready(rt),
                Err(err) => {
                    tracing::debug!(error = %err, "no usable caviar bundle");
                    State::Failed(err.to_string())
                }
            }
        });
        self.runtime()
    }

    /// Returns the runtime without attempting a load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if no load succeeded.
    pub fn runtime(&self) -> Result<&Runtime> {
        match self.cell.get() {
            Some(State::Ready(rt)) => Ok(rt),
            Some(State::Failed(reason)) => Err(Error::NotReady {
                reason: reason.clone(),
            }),
            None => Err(Error::NotReady {
                reason: "caviar has not been initialized".to_string(),
            }),
        }
    }

    /// Returns `true` once a load has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(State::Ready(_)))
    }
}

static GLOBAL: Bootstrap = Bootstrap::new();

/// Loads the bundle attached to the running executable into the
/// process-wide runtime.
///
/// # Errors
///
/// See [`Bootstrap::init`].
pub fn init() -> Result<&'static Runtime> {
    GLOBAL.init()
}

/// Loads a bundle into the process-wide runtime from an explicit source.
///
/// # Errors
///
/// See [`Bootstrap::init_with`].
pub fn init_with(source: ContainerSource, config: &RuntimeConfig) -> Result<&'static Runtime> {
    GLOBAL.init_with(source, config)
}

/// Returns the process-wide runtime.
///
/// # Errors
///
/// Returns [`Error::NotReady`] unless a load succeeded.
pub fn runtime() -> Result<&'static Runtime> {
    GLOBAL.runtime()
}

/// Returns the process-wide runtime, loading it on first use.
///
/// # Errors
///
/// Returns [`Error::NotReady`] if no bundle could be loaded.
pub fn ensure_init() -> Result<&'static Runtime> {
    GLOBAL.ensure_init()
}

fn load(source: ContainerSource, config: &RuntimeConfig) -> Result<Runtime> {
    match source {
        ContainerSource::CurrentExe => {
            let exe = std::env::current_exe().map_err(|e| Error::ContainerNotFound {
                path: "<current executable>".to_string(),
                reason: e.to_string(),
            })?;
            load_executable(&exe, config)
        }
        ContainerSource::Path(path) => {
            let reader = ContainerReader::open(&path)?;
            load_from(reader, parent_dir(&path), config)
        }
        ContainerSource::Bytes {
            bytes,
            default_prefix,
        } => load_from(ContainerReader::new(Cursor::new(bytes))?, &default_prefix, config),
    }
}

/// Tries the executable itself, then `<exe>.cvr`.
fn load_executable(exe: &Path, config: &RuntimeConfig) -> Result<Runtime> {
    let reader = match ContainerReader::open(exe) {
        Ok(reader) => reader,
        Err(err) => {
            let sidecar = detached_path(exe);
            tracing::debug!(
                executable = %exe.display(),
                sidecar = %sidecar.display(),
                error = %err,
                "no appended container, trying sidecar"
            );
            ContainerReader::open(&sidecar)?
        }
    };
    load_from(reader, parent_dir(exe), config)
}

fn load_from<R: Read + Seek>(
    mut reader: ContainerReader<R>,
    default_prefix: &Path,
    config: &RuntimeConfig,
) -> Result<Runtime> {
    let manifest = reader.manifest()?;

    let mode = manifest.options.extraction_mode;
    if !mode.is_supported() {
        return Err(Error::UnsupportedOption {
            option: "extraction_mode".to_string(),
            reason: format!("only memory extraction is supported, bundle requests {mode}"),
        });
    }

    let payload = reader.payload()?;
    Runtime::new(Container::new(manifest, payload), default_prefix, config)
}

/// Directory holding `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
        Some(dir) => dir,
        None => Path::new("/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caviar_core::checksum::calculate_checksum;
    use caviar_core::{ExtractionMode, Manifest, Object};

    fn encoded(manifest: Manifest, payload: &[u8]) -> Vec<u8> {
        Container::new(manifest, payload.to_vec()).encode().unwrap()
    }

    fn source(bytes: Vec<u8>) -> ContainerSource {
        ContainerSource::Bytes {
            bytes,
            default_prefix: PathBuf::from("/opt/app"),
        }
    }

    #[test]
    fn test_runtime_before_init_not_ready() {
        let boot = Bootstrap::new();
        assert!(!boot.is_ready());
        assert!(boot.runtime().unwrap_err().is_not_ready());
    }

    #[test]
    fn test_second_init_already_initialized() {
        let boot = Bootstrap::new();
        let bytes = encoded(Manifest::new("first"), b"");
        boot.init_with(source(bytes), &RuntimeConfig::default())
            .unwrap();

        let other = encoded(Manifest::new("second"), b"");
        let err = boot
            .init_with(source(other), &RuntimeConfig::default())
            .unwrap_err();
        assert!(err.is_already_initialized());
        assert_eq!(boot.runtime().unwrap().comment(), "first");
    }

    #[test]
    fn test_failed_init_is_permanent() {
        let boot = Bootstrap::new();
        let mut manifest = Manifest::new("");
        manifest
            .root
            .children
            .push(Object::file("a.txt", 0o644, 0, 2, 0, calculate_checksum(b"hi")));
        let bytes = encoded(manifest, b"hX");

        let err = boot
            .init_with(source(bytes), &RuntimeConfig::default())
            .unwrap_err();
        assert!(err.is_integrity_error());
        assert!(!boot.is_ready());
        assert!(boot.runtime().unwrap_err().is_not_ready());
        assert!(boot.ensure_init().unwrap_err().is_not_ready());
    }

    #[test]
    fn test_unsupported_mode_rejected_before_payload() {
        let boot = Bootstrap::new();
        let mut manifest = Manifest::new("");
        manifest.options.extraction_mode = ExtractionMode::ExecutableDir;
        let err = boot
            .init_with(source(encoded(manifest, b"")), &RuntimeConfig::default())
            .unwrap_err();
        assert!(err.is_unsupported_option());
        assert!(boot.runtime().unwrap_err().is_not_ready());
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let boot = Bootstrap::new();
        let err = boot
            .init_with(source(b"not a zip".to_vec()), &RuntimeConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
        assert!(!boot.is_ready());
    }

    #[test]
    fn test_path_source_uses_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.cvr");
        std::fs::write(&path, encoded(Manifest::new(""), b"")).unwrap();

        let boot = Bootstrap::new();
        let rt = boot
            .init_with(ContainerSource::Path(path), &RuntimeConfig::default())
            .unwrap();
        assert_eq!(rt.prefix(), dir.path());
    }

    fn one_file() -> Vec<u8> {
        let mut manifest = Manifest::new("");
        manifest
            .root
            .children
            .push(Object::file("a.txt", 0o644, 0, 2, 0, calculate_checksum(b"hi")));
        encoded(manifest, b"hi")
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("tool.cvr")), Path::new("."));
        assert_eq!(parent_dir(Path::new("bin/tool")), Path::new("bin"));
        assert_eq!(parent_dir(Path::new("/")), Path::new("/"));
    }

    #[test]
    fn test_relative_path_source_serves_files() {
        let dir = tempfile::Builder::new().tempdir_in(".").unwrap();
        let name = PathBuf::from(dir.path().file_name().unwrap());
        std::fs::write(dir.path().join("tool.cvr"), one_file()).unwrap();

        let boot = Bootstrap::new();
        let rt = boot
            .init_with(
                ContainerSource::Path(name.join("tool.cvr")),
                &RuntimeConfig::default(),
            )
            .unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(rt.prefix(), cwd.join(&name));
        assert_eq!(rt.stat_path(name.join("a.txt")).unwrap().size, 2);
        assert_eq!(rt.stat_path(cwd.join(&name).join("a.txt")).unwrap().size, 2);
    }

    #[test]
    fn test_relative_default_prefix_made_absolute() {
        let boot = Bootstrap::new();
        let source = ContainerSource::Bytes {
            bytes: one_file(),
            default_prefix: PathBuf::from("bundled"),
        };
        let rt = boot.init_with(source, &RuntimeConfig::default()).unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(rt.prefix(), cwd.join("bundled"));
        let fd = rt.open("bundled/a.txt").unwrap();
        rt.close(fd).unwrap();
    }

    #[test]
    fn test_executable_falls_back_to_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool");
        std::fs::write(&exe, b"plain executable bytes").unwrap();
        std::fs::write(detached_path(&exe), encoded(Manifest::new("sidecar"), b"")).unwrap();

        let rt = load_executable(&exe, &RuntimeConfig::default()).unwrap();
        assert_eq!(rt.comment(), "sidecar");
        assert_eq!(rt.prefix(), dir.path());
    }

    #[test]
    fn test_executable_without_any_container() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool");
        std::fs::write(&exe, b"plain executable bytes").unwrap();

        let err = load_executable(&exe, &RuntimeConfig::default()).unwrap_err();
        assert!(err.is_container_not_found());
        assert!(err.to_string().contains("tool.cvr"));
    }
}
