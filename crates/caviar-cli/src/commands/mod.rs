//! Command implementations for the Caviar CLI.
//!
//! Each command module builds a serializable summary, formats it according to
//! the requested output format, and returns an exit code.

pub mod bundle;
pub mod common;
pub mod completions;
pub mod inspect;
pub mod ls;
