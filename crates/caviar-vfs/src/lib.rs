//! Read-only virtual filesystem over a Caviar bundle.
//!
//! A program built with a Caviar bundle carries a tree of asset files in its
//! own executable (or in a `.cvr` file next to it). This crate loads that
//! bundle once, verifies it, and serves the files through calls shaped like
//! ordinary filesystem operations.
//!
//! # Architecture
//!
//! - [`Bootstrap`]: one-shot load, cached success or permanent failure
//! - [`Runtime`]: verified payload, [`Tree`] index, and the handle table
//! - [`Tree`]: arena of nodes with parent indices; path resolution
//! - [`EmbeddedFile`] and the free functions in [`fs`]: `std::fs` shapes
//!   with real-filesystem fallback
//!
//! # Examples
//!
//! ```no_run
//! use std::io::Read;
//!
//! // Served from the bundle when present, from disk otherwise.
//! let mut file = caviar_vfs::fs::open("assets/config.toml")?;
//! let mut text = String::new();
//! file.read_to_string(&mut text)?;
//! # Ok::<(), std::io::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod bootstrap;
mod config;
mod file;
mod handles;
mod runtime;
mod tree;
mod types;

/// `std::fs`-shaped helpers backed by the process-wide runtime.
pub mod fs {
    pub use crate::file::{
        AnyFile, metadata, open, read, read_dir, read_embedded, read_to_string,
    };
}

pub use bootstrap::{Bootstrap, ContainerSource, ensure_init, init, init_with, runtime};
pub use config::{MatchPolicy, READ_CHUNK_MAX, RuntimeConfig, RuntimeConfigBuilder};
pub use file::EmbeddedFile;
pub use handles::Cursor;
pub use runtime::Runtime;
pub use tree::{Node, NodeId, NodeKind, Resolution, Tree};
pub use types::{DIR_PERMISSIONS, DirBatch, FILE_PERMISSIONS, Fd, FileInfo, WalkEntry};
