//! ui-verify - data-driven UI verification
//!
//! Runs a suite of expectation records against a web application, one
//! isolated browser session per record, and reports which structural
//! checks failed.

use clap::Parser;
use commands::Commands;
use uiverify::common::logging;
use uiverify::{cli, commands};

#[derive(Parser)]
#[command(name = "ui-verify", about = "Data-driven UI verification harness")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (verbose, log_file) = match &cli.command {
        Commands::Run {
            verbose, log_file, ..
        } => (*verbose, log_file.clone()),
        Commands::Check { .. } => (false, None),
    };
    let log_path = match log_file {
        Some(Some(path)) => Some(path),
        Some(None) => logging::default_log_path(),
        None => None,
    };
    let guard = logging::init_cli(verbose, log_path.as_deref());

    let result = cli::dispatch(cli.command).await;

    // Flush the file appender before exiting
    drop(guard);

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
