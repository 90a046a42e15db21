//! CRC32 checksum utilities for asset integrity verification.
//!
//! Every non-empty file in a bundle records the CRC32 (IEEE polynomial) of
//! its payload bytes. The builder computes it while appending; the verifier
//! recomputes it at load.

use crate::error::{Error, IntegrityScope, Result};

/// Calculates the CRC32 checksum of `data`.
///
/// # Examples
///
/// ```
/// use caviar_core::checksum::calculate_checksum;
///
/// assert_eq!(calculate_checksum(b""), 0);
/// assert_eq!(calculate_checksum(b"123456789"), 0xCBF4_3926);
/// ```
#[must_use]
pub fn calculate_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Verifies that `data` matches the expected checksum.
///
/// # Errors
///
/// Returns [`Error::Integrity`] scoped to `path` if the checksum differs.
///
/// # Examples
///
/// ```
/// use caviar_core::checksum::{calculate_checksum, verify_checksum};
///
/// let data = b"hi";
/// let checksum = calculate_checksum(data);
///
/// verify_checksum(data, checksum, "a.txt").unwrap();
/// assert!(verify_checksum(data, checksum ^ 1, "a.txt").is_err());
/// ```
pub fn verify_checksum(data: &[u8], expected: u32, path: &str) -> Result<()> {
    let actual = calculate_checksum(data);
    if actual != expected {
        return Err(Error::Integrity {
            scope: IntegrityScope::Object {
                path: path.to_string(),
            },
            reason: format!("checksum mismatch: expected {expected:08x}, got {actual:08x}"),
        });
    }
    Ok(())
}
