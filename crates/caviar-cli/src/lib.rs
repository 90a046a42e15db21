//! Caviar CLI library.
//!
//! Exposes the command implementations and output formatters behind the
//! `caviar` binary so they can be tested without spawning a process.

#![allow(clippy::format_push_string)]
#![allow(clippy::unnecessary_wraps)] // every command returns Result<ExitCode>

pub mod cli;
pub mod commands;
pub mod formatters;

pub use cli::{ExitCode, OutputFormat};
