//! CLI command handling
//!
//! Loads configuration, builds the session backend, runs the suite and
//! formats the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::browser::{FixtureApp, FixtureFactory, SessionFactory, WebDriverFactory};
use crate::commands::Commands;
use crate::common::{Config, Error, Result};
use crate::credentials::Credentials;
use crate::verify::{generator, CaseContext, CaseResult, CheckStatus, RunReport, Suite};

/// Options of the `run` command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub suite: PathBuf,
    pub fixture: Option<PathBuf>,
    pub webdriver: Option<String>,
    pub workers: Option<usize>,
    pub only: Option<String>,
    pub json: bool,
}

/// Dispatch a CLI command.
///
/// Returns whether the command succeeded; a run with failed cases is
/// `Ok(false)`, a configuration problem is an `Err`.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            suite,
            fixture,
            webdriver,
            workers,
            only,
            json,
            ..
        } => {
            let report = run(RunOptions {
                suite,
                fixture,
                webdriver,
                workers,
                only,
                json,
            })
            .await?;
            Ok(report.success())
        }

        Commands::Check { suite } => {
            check(&suite)?;
            Ok(true)
        }
    }
}

/// Load everything, run the suite and print the report
pub async fn run(opts: RunOptions) -> Result<RunReport> {
    let config = Config::load()?;
    let suite = Suite::load(&opts.suite)?;
    let credentials = Credentials::from_env();
    tracing::debug!(?credentials, "Resolved credentials");

    let factory = build_factory(&config, &opts)?;

    let cases = generator::filter(generator::generate(&suite), opts.only.as_deref());
    if cases.is_empty() {
        return Err(Error::Config(format!(
            "No case name contains '{}'",
            opts.only.as_deref().unwrap_or_default()
        )));
    }

    if !opts.json {
        println!(
            "\n{} {} ({} cases, {} backend)",
            "Running Suite:".blue().bold(),
            opts.suite.display().to_string().white().bold(),
            cases.len(),
            factory.name()
        );
    }

    let ctx = Arc::new(CaseContext {
        credentials: Arc::new(credentials),
        target: Arc::new(suite.target.clone()),
        wait: config.timeouts.wait_policy(),
    });
    let workers = opts.workers.unwrap_or(config.run.workers);

    let progress = if opts.json {
        None
    } else {
        Some(progress_bar(cases.len() as u64))
    };

    let started = Instant::now();
    let results = generator::run_all(cases, ctx, factory, workers, |result| {
        if let Some(pb) = &progress {
            pb.set_message(result.name.clone());
            pb.inc(1);
        }
    })
    .await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = RunReport::new(results, started.elapsed());
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report)
}

fn build_factory(config: &Config, opts: &RunOptions) -> Result<Arc<dyn SessionFactory>> {
    match &opts.fixture {
        Some(path) => {
            let app = FixtureApp::load(path)?;
            tracing::info!(app = %app.title, areas = app.areas.len(), "Using fixture application");
            Ok(Arc::new(FixtureFactory::new(Arc::new(app))))
        }
        None => {
            let mut webdriver = config.webdriver.clone();
            if let Some(url) = &opts.webdriver {
                webdriver.url = url.clone();
            }
            tracing::info!(url = %webdriver.url, browser = ?webdriver.browser, "Using WebDriver");
            Ok(Arc::new(WebDriverFactory::new(webdriver)))
        }
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn print_report(report: &RunReport) {
    println!();
    for result in &report.results {
        print_case(result);
    }

    let summary = format!(
        "{} passed, {} failed ({} ms)",
        report.passed, report.failed, report.duration_ms
    );
    if report.success() {
        println!("\n{} {}\n", "✓".green().bold(), summary.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), summary.red().bold());
    }
}

fn print_case(result: &CaseResult) {
    let duration = format!("({} ms)", result.duration_ms);
    if result.passed() {
        println!("  {} {} {}", "✓".green(), result.name, duration.dimmed());
        return;
    }

    println!("  {} {} {}", "✗".red(), result.name, duration.dimmed());
    for diagnostic in &result.diagnostics {
        println!("      {}", diagnostic.red());
    }
    if let Some(error) = &result.error {
        println!("      {}", error.dimmed());
    }
    let skipped = result
        .checks
        .iter()
        .filter(|c| c.status == CheckStatus::Skipped)
        .count();
    if skipped > 0 {
        println!("      {}", format!("{} checks not evaluated", skipped).dimmed());
    }
}

/// Validate a suite and list its cases without opening any session
pub fn check(path: &Path) -> Result<()> {
    let suite = Suite::load(path)?;
    let credentials = Credentials::from_env();
    let cases = generator::generate(&suite);

    println!("\n{} {}", "Suite:".blue().bold(), path.display().to_string().white().bold());
    println!("  Target: {}", suite.target.url);
    println!("  Item lookup: {:?}", suite.target.item_scope);
    if let Some(landing) = &suite.target.landing {
        println!("  Landing: {}", landing);
    }
    println!(
        "  Username: {}{}",
        credentials.username,
        if credentials.is_default_username() {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        }
    );
    println!(
        "  Password: ********{}",
        if credentials.is_default_password() {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        }
    );

    println!("\n{}", "Cases:".cyan());
    for case in &cases {
        let checks: Vec<&str> = case.checks.iter().map(|c| c.name.as_str()).collect();
        println!(
            "  {} {}",
            format!("{:>3}.", case.index + 1).dimmed(),
            case.name()
        );
        println!("       {}", checks.join(", ").dimmed());
    }
    println!("\n{} {} cases\n", "✓".green(), cases.len());
    Ok(())
}
