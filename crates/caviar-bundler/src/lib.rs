//! Builds Caviar asset bundles.
//!
//! Collects one or more asset directories into a verified container and
//! attaches it to a program, either appended to the executable or as a
//! `.cvr` sidecar. The program reads the assets back through `caviar-vfs`.
//!
//! # Examples
//!
//! ```no_run
//! use caviar_bundler::BundleBuilder;
//!
//! BundleBuilder::new()
//!     .add_source("web/static")
//!     .add_source("templates")
//!     .detached(true)
//!     .build("target/release/server")?;
//! # Ok::<(), caviar_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod builder;

pub use builder::{BuildReport, BundleBuilder};
