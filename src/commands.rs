//! CLI command definitions
//!
//! Defines the clap commands for the verification CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every case of a suite
    Run {
        /// Path to the suite file (YAML or JSON)
        suite: PathBuf,

        /// Run against an in-memory fixture application instead of a browser
        #[arg(long, conflicts_with = "webdriver")]
        fixture: Option<PathBuf>,

        /// WebDriver server URL (overrides the config file)
        #[arg(long)]
        webdriver: Option<String>,

        /// Maximum number of cases running at once
        #[arg(long, short)]
        workers: Option<usize>,

        /// Only run cases whose name contains this text
        #[arg(long)]
        only: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Also write logs to a file (default location when no path is given)
        #[arg(long, value_name = "PATH", num_args = 0..=1)]
        log_file: Option<Option<PathBuf>>,
    },

    /// Validate a suite and list the cases it generates
    Check {
        /// Path to the suite file (YAML or JSON)
        suite: PathBuf,
    },
}
