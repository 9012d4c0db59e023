//! CLI module for the symbol processing engine
//!
//! ## Commands
//!
//! - `process --snapshot <file>` - Run processors over a compilation snapshot
//! - `plan` - Show what an incremental build would reprocess, without running anything
//! - `manifest <file>` - Print the dependency edges recorded by the last build
//! - `processors` - List the built-in processors
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::NullabilityPolicy;
use crate::version::SYMPROC_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The build ran to completion but reported errors or unresolved symbols.
    pub const BUILD_FAILED: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self::new(message, ExitCode(code))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Multi-round symbol processing over a compilation snapshot
#[derive(Parser, Debug)]
#[command(name = "symproc")]
#[command(version = SYMPROC_VERSION)]
#[command(about = "Multi-round symbol processing with incremental rebuilds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run processors over a compilation snapshot
    Process(ProcessArgs),

    /// Show the incremental plan for a set of changes
    Plan(PlanArgs),

    /// Print the dependency edges of a manifest
    Manifest {
        /// Manifest file written by a previous build
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print the manifest as JSON instead of edges
        #[arg(long)]
        json: bool,
    },

    /// List the built-in processors
    Processors,
}

/// Options shared by `process` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Changed-files description (JSON); `process` rebuilds everything without it
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    /// Processing configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for generated files
    #[arg(long = "out", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for the manifest and incremental log
    #[arg(long = "caches", value_name = "DIR")]
    pub caches_dir: Option<PathBuf>,

    /// Processor to run, by id (repeatable; default: all built-ins)
    #[arg(short = 'p', long = "processor", value_name = "ID")]
    pub processors: Vec<String>,

    /// Disable incremental processing
    #[arg(long)]
    pub no_incremental: bool,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Compilation snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Processor option `key=value` (repeatable)
    #[arg(short = 'A', value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Run processors of one round in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Maximum number of rounds
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u32>,

    /// Treat processor warnings as errors
    #[arg(long = "warnings-as-errors")]
    pub warnings_as_errors: bool,

    /// Write the incremental log next to the manifest
    #[arg(long = "incremental-log")]
    pub incremental_log: bool,

    /// How platform nullability surfaces in resolved types
    #[arg(long, value_enum, value_name = "POLICY")]
    pub nullability: Option<PolicyArg>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Modified file (repeatable; added to `--changes`)
    #[arg(long = "modified", value_name = "PATH")]
    pub modified: Vec<PathBuf>,

    /// Added file (repeatable)
    #[arg(long = "added", value_name = "PATH")]
    pub added: Vec<PathBuf>,

    /// Removed file (repeatable)
    #[arg(long = "removed", value_name = "PATH")]
    pub removed: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Keep platform nullability flexible
    Flexible,
    /// Treat platform types as nullable
    Nullable,
    /// Treat platform types as not-null
    NotNull,
}

impl From<PolicyArg> for NullabilityPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Flexible => NullabilityPolicy::Flexible,
            PolicyArg::Nullable => NullabilityPolicy::AssumeNullable,
            PolicyArg::NotNull => NullabilityPolicy::AssumeNotNull,
        }
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Process(args) => commands::process(&args),
        Command::Plan(args) => commands::plan(&args),
        Command::Manifest { file, json } => commands::show_manifest(&file, json),
        Command::Processors => commands::list_processors(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_process() {
        let cli = Cli::try_parse_from([
            "symproc",
            "process",
            "--snapshot",
            "snap.json",
            "-p",
            "impl-stub",
            "-A",
            "impl-stub.annotation=a.Gen",
            "--parallel",
            "--max-rounds",
            "7",
        ])
        .unwrap();
        let Command::Process(args) = cli.command else {
            panic!("Expected Process command");
        };
        assert_eq!(args.snapshot, PathBuf::from("snap.json"));
        assert_eq!(args.build.processors, vec!["impl-stub"]);
        assert_eq!(args.options, vec!["impl-stub.annotation=a.Gen"]);
        assert!(args.parallel);
        assert_eq!(args.max_rounds, Some(7));
        assert!(args.build.changes.is_none());
    }

    #[test]
    fn test_cli_parse_process_requires_snapshot() {
        assert!(Cli::try_parse_from(["symproc", "process"]).is_err());
    }

    #[test]
    fn test_cli_parse_nullability() {
        let cli = Cli::try_parse_from(["symproc", "process", "--snapshot", "s.json", "--nullability", "not-null"])
            .unwrap();
        let Command::Process(args) = cli.command else {
            panic!("Expected Process command");
        };
        assert_eq!(args.nullability, Some(PolicyArg::NotNull));
        assert_eq!(NullabilityPolicy::from(PolicyArg::NotNull), NullabilityPolicy::AssumeNotNull);
    }

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::try_parse_from([
            "symproc",
            "plan",
            "--modified",
            "a/A.kt",
            "--removed",
            "b/B.kt",
        ])
        .unwrap();
        let Command::Plan(args) = cli.command else {
            panic!("Expected Plan command");
        };
        assert_eq!(args.modified, vec![PathBuf::from("a/A.kt")]);
        assert_eq!(args.removed, vec![PathBuf::from("b/B.kt")]);
        assert!(args.added.is_empty());
    }

    #[test]
    fn test_cli_parse_manifest() {
        let cli = Cli::try_parse_from(["symproc", "manifest", "m.json", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Manifest { json: true, .. }));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["symproc"]).is_err());
    }
}
