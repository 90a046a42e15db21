//! Manifest verification.
//!
//! Runs once against a freshly decoded [`Manifest`] and the loaded payload.
//! Every check must pass before a runtime may be marked ready:
//!
//! 1. manifest magic
//! 2. root marker
//! 3. extraction mode
//! 4. per-object shape, range and CRC32
//! 5. total file bytes against the payload length

use crate::checksum::verify_checksum;
use crate::error::{Error, IntegrityScope, Result};
use crate::manifest::{MANIFEST_MAGIC, Manifest, Object, ROOT_NAME};
use std::collections::HashSet;

/// Summary of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifyReport {
    /// Number of file objects
    pub files: usize,
    /// Number of directory objects, root included
    pub directories: usize,
    /// Sum of file sizes, equal to the payload length
    pub bytes: u64,
}

/// Verifies a manifest against its payload.
///
/// # Errors
///
/// * [`Error::SchemaMismatch`] - wrong magic, root marker, or object shape
/// * [`Error::UnsupportedOption`] - extraction mode other than `memory`
/// * [`Error::Integrity`] - a checksum or range failure (object scope), or a
///   payload whose length differs from the manifest tally (aggregate scope)
///
/// # Examples
///
/// ```
/// use caviar_core::checksum::calculate_checksum;
/// use caviar_core::manifest::{Manifest, Object};
/// use caviar_core::verify::verify_manifest;
///
/// let payload = b"hi".to_vec();
/// let mut manifest = Manifest::new("");
/// manifest.root.children.push(Object::file(
///     "a.txt", 0o644, 0, 2, 0, calculate_checksum(&payload),
/// ));
///
/// let report = verify_manifest(&manifest, &payload).unwrap();
/// assert_eq!(report.files, 1);
/// assert_eq!(report.bytes, 2);
/// ```
pub fn verify_manifest(manifest: &Manifest, payload: &[u8]) -> Result<VerifyReport> {
    if manifest.magic != MANIFEST_MAGIC {
        return Err(Error::SchemaMismatch {
            reason: format!(
                "container has invalid magic value (expected {MANIFEST_MAGIC}, got {})",
                manifest.magic
            ),
        });
    }

    if manifest.root.name != ROOT_NAME {
        return Err(Error::SchemaMismatch {
            reason: format!(
                "asset root has invalid name (expected {ROOT_NAME}, got {})",
                manifest.root.name
            ),
        });
    }

    let mode = manifest.options.extraction_mode;
    if !mode.is_supported() {
        return Err(Error::UnsupportedOption {
            option: "extraction_mode".to_string(),
            reason: format!("only memory extraction is supported, bundle requests {mode}"),
        });
    }

    if !manifest.root.is_dir() {
        return Err(Error::SchemaMismatch {
            reason: "root object must be a directory".to_string(),
        });
    }

    let mut report = VerifyReport::default();
    verify_object(&manifest.root, "", payload, &mut report)?;

    let actual = payload.len() as u64;
    if report.bytes != actual {
        return Err(Error::Integrity {
            scope: IntegrityScope::Aggregate {
                expected: report.bytes,
                actual,
            },
            reason: "asset payload size differs from manifest tally".to_string(),
        });
    }

    tracing::debug!(
        files = report.files,
        directories = report.directories,
        bytes = report.bytes,
        "manifest verified"
    );
    Ok(report)
}

fn verify_object(
    obj: &Object,
    path: &str,
    payload: &[u8],
    report: &mut VerifyReport,
) -> Result<()> {
    let shape_error = |what: &str| Error::SchemaMismatch {
        reason: format!("{what} object '{}' does not pass sanity checks", display(path)),
    };

    if obj.is_dir() {
        if obj.size != 0 || obj.offset != 0 || obj.checksum != 0 {
            return Err(shape_error("directory"));
        }
        report.directories += 1;

        let mut seen = HashSet::with_capacity(obj.children.len());
        for child in &obj.children {
            validate_name(&child.name, path)?;
            if !seen.insert(child.name.as_str()) {
                return Err(Error::SchemaMismatch {
                    reason: format!(
                        "duplicate entry '{}' in directory '{}'",
                        child.name,
                        display(path)
                    ),
                });
            }
            let child_path = if path.is_empty() {
                child.name.clone()
            } else {
                format!("{path}/{}", child.name)
            };
            verify_object(child, &child_path, payload, report)?;
        }
        return Ok(());
    }

    if !obj.children.is_empty() {
        return Err(shape_error("file"));
    }
    report.files += 1;

    if obj.size == 0 {
        if obj.offset != 0 || obj.checksum != 0 {
            return Err(shape_error("file"));
        }
        return Ok(());
    }

    let data = obj
        .offset
        .checked_add(obj.size)
        .and_then(|end| {
            let start = usize::try_from(obj.offset).ok()?;
            let end = usize::try_from(end).ok()?;
            payload.get(start..end)
        })
        .ok_or_else(|| Error::Integrity {
            scope: IntegrityScope::Object {
                path: path.to_string(),
            },
            reason: format!(
                "range {}+{} lies outside the {}-byte payload",
                obj.offset,
                obj.size,
                payload.len()
            ),
        })?;

    verify_checksum(data, obj.checksum, path)?;
    report.bytes += obj.size;
    Ok(())
}

fn validate_name(name: &str, parent: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::SchemaMismatch {
            reason: format!("invalid entry name '{name}' in directory '{}'", display(parent)),
        });
    }
    Ok(())
}

fn display(path: &str) -> &str {
    if path.is_empty() { ROOT_NAME } else { path }
}
