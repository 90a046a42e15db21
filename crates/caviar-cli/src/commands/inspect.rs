//! Inspect command: decode and verify a bundle.

use super::common::load_container;
use crate::cli::{ExitCode, OutputFormat};
use crate::formatters::format_output;
use anyhow::Result;
use caviar_core::Container;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// What `caviar inspect` reports.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InspectSummary {
    /// File the container was read from
    pub source: String,
    /// Manifest magic string
    pub magic: String,
    /// Generator comment
    pub comment: String,
    /// Fixed virtual root, if the bundle sets one
    pub custom_prefix: Option<String>,
    /// Runtime debug logging
    pub debug: bool,
    /// Requested extraction mode
    pub extraction_mode: String,
    /// Files in the manifest
    pub files: usize,
    /// Directories in the manifest, root included
    pub directories: usize,
    /// Payload length in bytes
    pub payload_bytes: u64,
    /// Whether every structural and checksum check passed
    pub verified: bool,
    /// First verification failure
    pub error: Option<String>,
}

impl InspectSummary {
    /// Summarizes `container` and runs the verifier over it.
    #[must_use]
    pub fn new(source: &Path, container: &Container) -> Self {
        let manifest = &container.manifest;
        let error = container.verify().err().map(|e| e.to_string());
        Self {
            source: source.display().to_string(),
            magic: manifest.magic.clone(),
            comment: manifest.comment.clone(),
            custom_prefix: Some(manifest.options.custom_prefix.clone())
                .filter(|p| !p.is_empty()),
            debug: manifest.options.debug,
            extraction_mode: manifest.options.extraction_mode.to_string(),
            files: manifest.root.file_count(),
            directories: manifest.root.dir_count(),
            payload_bytes: container.payload.len() as u64,
            verified: error.is_none(),
            error,
        }
    }
}

/// Runs the inspect command.
///
/// A bundle that decodes but fails verification is reported, not raised:
/// the summary is printed and the exit code is [`ExitCode::ERROR`].
///
/// # Errors
///
/// Returns an error if no container can be read at `path`.
pub fn run(path: &Path, output_format: OutputFormat) -> Result<ExitCode> {
    let (source, container) = load_container(path)?;
    let summary = InspectSummary::new(&source, &container);

    if let Some(error) = &summary.error {
        warn!(source = %summary.source, %error, "bundle failed verification");
    } else {
        info!(source = %summary.source, files = summary.files, "bundle verified");
    }

    println!("{}", format_output(&summary, output_format)?);
    Ok(if summary.verified {
        ExitCode::SUCCESS
    } else {
        ExitCode::ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use caviar_core::checksum::calculate_checksum;
    use caviar_core::{Manifest, Object};

    fn container() -> Container {
        let mut manifest = Manifest::new("inspect test");
        manifest.options.custom_prefix = "/opt/x".to_string();
        manifest
            .root
            .children
            .push(Object::file("a.txt", 0o644, 0, 2, 0, calculate_checksum(b"hi")));
        Container::new(manifest, b"hi".to_vec())
    }

    #[test]
    fn test_summary_of_valid_bundle() {
        let summary = InspectSummary::new(Path::new("tool"), &container());
        assert!(summary.verified);
        assert_eq!(summary.error, None);
        assert_eq!(summary.files, 1);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.payload_bytes, 2);
        assert_eq!(summary.custom_prefix.as_deref(), Some("/opt/x"));
        assert_eq!(summary.extraction_mode, "memory");
    }

    #[test]
    fn test_summary_of_corrupt_bundle() {
        let mut container = container();
        container.payload[0] ^= 1;
        let summary = InspectSummary::new(Path::new("tool"), &container);
        assert!(!summary.verified);
        assert!(summary.error.unwrap().contains("a.txt"));
    }

    #[test]
    fn test_run_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.cvr");
        std::fs::write(&good, container().encode().unwrap()).unwrap();
        assert_eq!(run(&good, OutputFormat::Json).unwrap(), ExitCode::SUCCESS);

        let mut corrupt = container();
        corrupt.payload[1] ^= 1;
        let bad = dir.path().join("bad.cvr");
        std::fs::write(&bad, corrupt.encode().unwrap()).unwrap();
        assert_eq!(run(&bad, OutputFormat::Json).unwrap(), ExitCode::ERROR);
    }

    #[test]
    fn test_run_without_bundle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::write(&plain, b"no zip here").unwrap();
        assert!(run(&plain, OutputFormat::Text).is_err());
    }
}
