//! Ls command: list the bundled tree.

use super::common::load_container;
use crate::cli::{ExitCode, OutputFormat};
use crate::formatters::format_output;
use anyhow::Result;
use caviar_core::Object;
use caviar_core::manifest::MODE_PERM_MASK;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// One bundled entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListEntry {
    /// Bundle-relative path, `/`-separated
    pub path: String,
    /// `dir` or `file`
    pub kind: &'static str,
    /// Byte length; 0 for directories
    pub size: u64,
    /// Permission bits recorded at build time, in octal
    pub mode: String,
    /// Modification time recorded at build time (RFC 3339)
    pub modified: Option<String>,
}

/// Lists every entry below the bundle root, parents before children.
#[must_use]
pub fn list(root: &Object) -> Vec<ListEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(String, &Object)> = root
        .children
        .iter()
        .rev()
        .map(|child| (child.name.clone(), child))
        .collect();

    while let Some((path, object)) = stack.pop() {
        for child in object.children.iter().rev() {
            stack.push((format!("{path}/{}", child.name), child));
        }
        entries.push(ListEntry {
            kind: if object.is_dir() { "dir" } else { "file" },
            size: object.size,
            mode: format!("{:04o}", object.mode_bits & MODE_PERM_MASK),
            modified: DateTime::<Utc>::from_timestamp(object.mod_time, 0)
                .map(|t| t.to_rfc3339()),
            path,
        });
    }
    entries
}

/// Runs the ls command.
///
/// # Errors
///
/// Returns an error if no container can be read at `path`.
pub fn run(path: &Path, output_format: OutputFormat) -> Result<ExitCode> {
    let (_, container) = load_container(path)?;
    let entries = list(&container.manifest.root);
    println!("{}", format_output(&entries, output_format)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caviar_core::Manifest;

    #[test]
    fn test_list_preorder() {
        let mut manifest = Manifest::new("");
        let mut sub = Object::dir("sub", 0o755, 0);
        sub.children.push(Object::file("b.txt", 0o600, 60, 3, 2, 0));
        manifest.root.children.push(Object::file("a.txt", 0o644, 0, 2, 0, 0));
        manifest.root.children.push(sub);

        let entries = list(&manifest.root);
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub", "sub/b.txt"]);

        assert_eq!(entries[1].kind, "dir");
        assert_eq!(entries[1].mode, "0755");
        assert_eq!(entries[2].kind, "file");
        assert_eq!(entries[2].mode, "0600");
        assert_eq!(entries[2].size, 3);
        assert_eq!(
            entries[2].modified.as_deref(),
            Some("1970-01-01T00:01:00+00:00")
        );
    }

    #[test]
    fn test_list_empty_root() {
        assert!(list(&Manifest::new("").root).is_empty());
    }
}
