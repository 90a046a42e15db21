//! Bundle command: attach asset directories to an executable.

use crate::cli::{ExitCode, OutputFormat};
use crate::formatters::format_output;
use anyhow::{Context, Result};
use caviar_bundler::{BuildReport, BundleBuilder};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Arguments of `caviar bundle`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BundleArgs {
    /// Executable to attach the bundle to
    pub executable: PathBuf,

    /// Asset directories or files to bundle
    #[arg(required = true)]
    pub assets: Vec<PathBuf>,

    /// Keep each asset directory as a named subdirectory
    #[arg(long)]
    pub cherrypick: bool,

    /// Write a `.cvr` sidecar instead of appending to the executable
    #[arg(long)]
    pub detached: bool,

    /// Fixed runtime virtual root (default: the executable's directory)
    #[arg(long, value_name = "PATH")]
    pub prefix: Option<String>,

    /// Log every internal runtime error
    #[arg(long)]
    pub debug: bool,

    /// Free-form comment stored in the manifest
    #[arg(long)]
    pub comment: Option<String>,
}

impl BundleArgs {
    /// Translates the arguments into a configured builder.
    #[must_use]
    pub fn builder(&self) -> BundleBuilder {
        let mut builder = BundleBuilder::new()
            .add_sources(self.assets.iter().cloned())
            .cherrypick(self.cherrypick)
            .detached(self.detached)
            .debug(self.debug);
        if let Some(prefix) = &self.prefix {
            builder = builder.custom_prefix(prefix.clone());
        }
        if let Some(comment) = &self.comment {
            builder = builder.comment(comment.clone());
        }
        builder
    }
}

/// Result of a bundle run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BundleSummary {
    /// File that now carries the bundle
    pub output: String,
    /// `appended` or `detached`
    pub mode: &'static str,
    /// Bundled files
    pub files: usize,
    /// Bundled directories, root included
    pub directories: usize,
    /// Payload bytes
    pub payload_bytes: u64,
    /// Archive bytes written
    pub archive_bytes: u64,
}

impl From<BuildReport> for BundleSummary {
    fn from(report: BuildReport) -> Self {
        Self {
            output: report.output.display().to_string(),
            mode: if report.detached { "detached" } else { "appended" },
            files: report.files,
            directories: report.directories,
            payload_bytes: report.payload_bytes,
            archive_bytes: report.archive_bytes,
        }
    }
}

/// Runs the bundle command.
///
/// # Errors
///
/// Returns an error if the bundle cannot be built or written.
pub fn run(args: &BundleArgs, output_format: OutputFormat) -> Result<ExitCode> {
    info!(
        executable = %args.executable.display(),
        sources = args.assets.len(),
        "bundling assets"
    );

    let report = args
        .builder()
        .build(&args.executable)
        .with_context(|| format!("failed to bundle assets into {}", args.executable.display()))?;

    let summary = BundleSummary::from(report);
    println!("{}", format_output(&summary, output_format)?);
    Ok(ExitCode::SUCCESS)
}
