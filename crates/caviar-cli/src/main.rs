//! Caviar CLI.
//!
//! Builds asset bundles into executables and inspects existing ones.
//!
//! # Examples
//!
//! ```bash
//! # Append ./assets to the release binary
//! caviar bundle target/release/server assets
//!
//! # Check what a binary carries
//! caviar inspect target/release/server
//! caviar --format json ls target/release/server
//! ```

use anyhow::Result;
use caviar_cli::commands::{self, bundle::BundleArgs};
use caviar_cli::{ExitCode, OutputFormat};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Caviar - read-only asset bundles carried inside executables.
#[derive(Parser, Debug)]
#[command(name = "caviar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long = "format", global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bundle asset directories into an executable.
    ///
    /// The bundle is appended to the executable unless `--detached` is
    /// given, in which case `<executable>.cvr` is written next to it.
    ///
    /// # Examples
    ///
    /// ```bash
    /// caviar bundle ./server web/static templates --cherrypick
    /// caviar bundle ./server assets --detached --prefix /usr/share/server
    /// ```
    Bundle(BundleArgs),

    /// Decode and verify a bundled executable or sidecar.
    ///
    /// Exits with status 1 if the bundle fails verification.
    Inspect {
        /// Bundled executable or `.cvr` file
        path: PathBuf,
    },

    /// List the files in a bundle.
    Ls {
        /// Bundled executable or `.cvr` file
        path: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell for completion generation
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let exit_code = execute_command(cli.command, cli.format)?;

    std::process::exit(exit_code.as_i32());
}

/// Installs the stderr subscriber.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, defaulting to
/// `info`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Routes a parsed command to its handler.
fn execute_command(command: Commands, output_format: OutputFormat) -> Result<ExitCode> {
    match command {
        Commands::Bundle(args) => commands::bundle::run(&args, output_format),
        Commands::Inspect { path } => commands::inspect::run(&path, output_format),
        Commands::Ls { path } => commands::ls::run(&path, output_format),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            commands::completions::run(shell, &mut cmd)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_bundle() {
        let cli = Cli::parse_from([
            "caviar",
            "bundle",
            "./server",
            "assets",
            "templates",
            "--cherrypick",
            "--prefix",
            "/usr/share/server",
        ]);
        let Commands::Bundle(args) = cli.command else {
            panic!("Expected Bundle command");
        };
        assert_eq!(args.executable, PathBuf::from("./server"));
        assert_eq!(
            args.assets,
            vec![PathBuf::from("assets"), PathBuf::from("templates")]
        );
        assert!(args.cherrypick);
        assert!(!args.detached);
        assert_eq!(args.prefix.as_deref(), Some("/usr/share/server"));
    }

    #[test]
    fn test_cli_bundle_requires_assets() {
        assert!(Cli::try_parse_from(["caviar", "bundle", "./server"]).is_err());
    }

    #[test]
    fn test_cli_parsing_inspect() {
        let cli = Cli::parse_from(["caviar", "inspect", "app.cvr"]);
        assert!(matches!(cli.command, Commands::Inspect { ref path } if path == &PathBuf::from("app.cvr")));
    }

    #[test]
    fn test_cli_parsing_ls() {
        let cli = Cli::parse_from(["caviar", "ls", "./server"]);
        assert!(matches!(cli.command, Commands::Ls { .. }));
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["caviar", "--verbose", "ls", "x"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::parse_from(["caviar", "ls", "x"]);
        assert_eq!(cli.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_cli_output_format_global() {
        let cli = Cli::parse_from(["caviar", "inspect", "x", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_output_format_invalid() {
        assert!(Cli::try_parse_from(["caviar", "--format", "yaml", "ls", "x"]).is_err());
    }

    #[test]
    fn test_cli_parsing_completions() {
        let cli = Cli::parse_from(["caviar", "completions", "zsh"]);
        let Commands::Completions { shell } = cli.command else {
            panic!("Expected Completions command");
        };
        assert_eq!(shell, Shell::Zsh);
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
