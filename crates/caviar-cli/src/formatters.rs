//! Output formatters for CLI commands.
//!
//! Every command builds a serializable summary and hands it here, so the
//! three output modes stay consistent across commands.

use crate::cli::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

/// Formats `data` according to `format`.
///
/// # Errors
///
/// Returns an error if `data` cannot be serialized.
///
/// # Examples
///
/// ```
/// use caviar_cli::OutputFormat;
/// use caviar_cli::formatters::format_output;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Summary {
///     files: usize,
/// }
///
/// let out = format_output(&Summary { files: 3 }, OutputFormat::Text)?;
/// assert_eq!(out, "files: 3");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::format(data),
        OutputFormat::Text => text::format(data),
        OutputFormat::Pretty => pretty::format(data),
    }
}

/// JSON output formatting.
pub mod json {
    use super::{Result, Serialize};

    /// Formats data as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

/// Plain text output formatting.
pub mod text {
    use super::{Result, Serialize, Value};

    /// Formats data as one `key: value` line per leaf.
    ///
    /// Nested keys are joined with `.`, array items are indexed. Suitable for
    /// `grep` and `cut`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut lines = Vec::new();
        flatten(&value, String::new(), &mut lines);
        Ok(lines.join("\n"))
    }

    fn flatten(value: &Value, key: String, lines: &mut Vec<String>) {
        let join = |child: &str| {
            if key.is_empty() {
                child.to_string()
            } else {
                format!("{key}.{child}")
            }
        };
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    flatten(v, join(k), lines);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    flatten(v, join(&i.to_string()), lines);
                }
            }
            Value::String(s) if key.is_empty() => lines.push(s.clone()),
            Value::String(s) => lines.push(format!("{key}: {s}")),
            other if key.is_empty() => lines.push(other.to_string()),
            other => lines.push(format!("{key}: {other}")),
        }
    }
}

/// Pretty (human-readable) output formatting.
pub mod pretty {
    use super::{Colorize, Result, Serialize, Value};

    /// Formats data as an indented, colored outline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut out = String::new();
        write_value(&value, 0, &mut out);
        Ok(out.trim_end().to_string())
    }

    fn write_value(value: &Value, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        match value {
            Value::Object(map) => {
                for (key, val) in map {
                    match val {
                        Value::Object(_) | Value::Array(_) => {
                            out.push_str(&format!("{pad}{}:\n", key.blue().bold()));
                            write_value(val, indent + 1, out);
                        }
                        _ => out.push_str(&format!("{pad}{}: {}\n", key.blue().bold(), scalar(val))),
                    }
                }
            }
            Value::Array(items) if items.is_empty() => {
                out.push_str(&format!("{pad}{}\n", "(none)".dimmed()));
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(_) | Value::Array(_) => {
                            out.push_str(&format!("{pad}-\n"));
                            write_value(item, indent + 1, out);
                        }
                        _ => out.push_str(&format!("{pad}- {}\n", scalar(item))),
                    }
                }
            }
            _ => out.push_str(&format!("{pad}{}\n", scalar(value))),
        }
    }

    fn scalar(value: &Value) -> String {
        match value {
            Value::Null => "-".dimmed().to_string(),
            Value::Bool(true) => "yes".green().to_string(),
            Value::Bool(false) => "no".red().to_string(),
            Value::Number(n) => n.to_string().cyan().to_string(),
            Value::String(s) => s.green().to_string(),
            Value::Object(_) | Value::Array(_) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Entry {
        path: String,
        size: u64,
    }

    #[derive(Serialize)]
    struct Listing {
        verified: bool,
        entries: Vec<Entry>,
    }

    fn listing() -> Listing {
        Listing {
            verified: true,
            entries: vec![
                Entry {
                    path: "a.txt".to_string(),
                    size: 2,
                },
                Entry {
                    path: "sub/b.txt".to_string(),
                    size: 3,
                },
            ],
        }
    }

    #[test]
    fn test_json_is_parseable() {
        let out = format_output(&listing(), OutputFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["entries"][1]["path"], "sub/b.txt");
    }

    #[test]
    fn test_text_flattens_keys() {
        let out = format_output(&listing(), OutputFormat::Text).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "entries.0.path: a.txt",
                "entries.0.size: 2",
                "entries.1.path: sub/b.txt",
                "entries.1.size: 3",
                "verified: true",
            ]
        );
    }

    #[test]
    fn test_text_bare_string() {
        assert_eq!(text::format(&"hello").unwrap(), "hello");
    }

    #[test]
    fn test_pretty_contains_values() {
        colored::control::set_override(false);
        let out = format_output(&listing(), OutputFormat::Pretty).unwrap();
        assert!(out.contains("verified: yes"));
        assert!(out.contains("path: sub/b.txt"));
        assert!(out.contains("size: 3"));
    }

    #[test]
    fn test_pretty_empty_array() {
        colored::control::set_override(false);
        let empty = Listing {
            verified: false,
            entries: Vec::new(),
        };
        let out = pretty::format(&empty).unwrap();
        assert!(out.contains("verified: no"));
        assert!(out.contains("(none)"));
    }
}
