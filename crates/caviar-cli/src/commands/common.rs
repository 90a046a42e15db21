//! Helpers shared by the read-side commands.

use anyhow::{Context, Result};
use caviar_core::{Container, ContainerReader, Error, detached_path};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads the container at `path`, or at its `.cvr` sidecar.
///
/// `path` may be a bundled executable or a sidecar. The container is decoded
/// but not verified. Returns the file that actually held it.
///
/// # Errors
///
/// Returns an error if neither file holds a readable container.
pub fn load_container(path: &Path) -> Result<(PathBuf, Container)> {
    let (source, mut reader) = match ContainerReader::open(path) {
        Ok(reader) => (path.to_path_buf(), reader),
        Err(Error::ContainerNotFound { .. }) if detached_path(path) != path => {
            let sidecar = detached_path(path);
            debug!(sidecar = %sidecar.display(), "no appended container, trying sidecar");
            let reader = ContainerReader::open(&sidecar)
                .with_context(|| format!("no Caviar bundle in {}", path.display()))?;
            (sidecar, reader)
        }
        Err(err) => {
            return Err(err).with_context(|| format!("no Caviar bundle in {}", path.display()));
        }
    };

    let manifest = reader
        .manifest()
        .with_context(|| format!("failed to read manifest from {}", source.display()))?;
    let payload = reader
        .payload()
        .with_context(|| format!("failed to read payload from {}", source.display()))?;
    Ok((source, Container::new(manifest, payload)))
}
