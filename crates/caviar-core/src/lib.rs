//! Container format and integrity checks for Caviar asset bundles.
//!
//! A Caviar bundle is a read-only tree of files carried inside (or next to)
//! an executable. This crate owns everything that is shared between the
//! program that builds a bundle and the runtime that serves it.
//!
//! # Architecture
//!
//! - [`manifest`]: the metadata tree ([`Manifest`], [`Object`], [`BundleOptions`])
//! - [`container`]: ZIP encoding, decoding, and offset realignment
//! - [`verify`]: the one-shot structural and CRC32 check run at load
//! - [`checksum`]: CRC32 helpers
//! - Error hierarchy with classification helpers
//!
//! # Examples
//!
//! ```
//! use caviar_core::checksum::calculate_checksum;
//! use caviar_core::{Container, Manifest, Object};
//! use std::io::Cursor;
//!
//! let mut manifest = Manifest::new("example");
//! manifest.root.children.push(Object::file("a.txt", 0o644, 0, 2, 0, calculate_checksum(b"hi")));
//!
//! let archive = Container::new(manifest, b"hi".to_vec()).encode().unwrap();
//! let loaded = Container::from_reader(Cursor::new(archive)).unwrap();
//! assert_eq!(loaded.verify().unwrap().files, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod checksum;
pub mod container;
mod error;
pub mod manifest;
pub mod verify;

pub use container::{Container, ContainerReader, detached_path, realign};
pub use error::{Error, IntegrityScope, Result};
pub use manifest::{
    BUNDLE_EXTENSION, BundleOptions, ExtractionMode, MANIFEST_MAGIC, Manifest, Object, ROOT_NAME,
};
pub use verify::{VerifyReport, verify_manifest};
