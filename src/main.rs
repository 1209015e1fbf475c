//! scc-history - per-language code metrics over a git repository's history
//!
//! This tool builds a time series of `scc` metrics by:
//! 1. Cloning the repository into a temporary workspace
//! 2. Enumerating sample dates (daily, weekly, monthly or explicit dates)
//! 3. For each date: checking out the last commit on or before it and running `scc`
//! 4. Writing the per-date, per-language table as JSON or wide CSV, optionally plotted

mod collector;
mod error;
mod git;
mod output;
mod period;
mod stats;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{MetricsError, Result};
use crate::git::{GitCli, Vcs, Workspace};
use crate::period::Cadence;
use crate::stats::Scc;

/// Sample a git repository's history and collect scc metrics per language
#[derive(Parser, Debug)]
#[command(name = "scc-history")]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the git repository
    repo_url: String,

    /// Branch or ref to sample
    #[arg(long, default_value = "HEAD")]
    branch: String,

    /// Specific dates to sample instead of the entire history
    #[arg(long, num_args = 1.., value_name = "YYYY-MM-DD", value_parser = period::parse_date)]
    dates: Vec<NaiveDate>,

    /// Sampling period if --dates is not provided
    #[arg(long, value_enum, default_value_t = Cadence::Monthly)]
    period: Cadence,

    /// Enable debug output of commits and raw scc JSON
    #[arg(long, short = 'D')]
    debug: bool,

    /// Output results in CSV wide format (one column per language metric)
    #[arg(long)]
    csv: bool,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Generate a plot of lines per language (PNG format)
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Path to the scc executable
    #[arg(long, env = "SCC_PATH", default_value = "scc")]
    scc: PathBuf,
}

/// `RUST_LOG` when set, otherwise `info`; `--debug` always enables this
/// crate's debug output on top of it
fn log_filter(env: Option<&str>, debug: bool) -> EnvFilter {
    let filter = env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if debug { "debug" } else { "info" }));

    if !debug {
        return filter;
    }
    match "scc_history=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn init_logging(debug: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(log_filter(env.as_deref(), debug))
        .init();
}

/// Remove the workspace if the run is interrupted
fn install_interrupt_cleanup(workspace: &Workspace) -> Result<()> {
    let path = workspace.path().to_path_buf();
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_dir_all(&path);
        std::process::exit(130);
    })
    .map_err(|e| MetricsError::Command(format!("Failed to install interrupt handler: {}", e)))
}

/// Sample dates: the explicit list, or the cadence over the branch's history
fn sample_dates(
    vcs: &dyn Vcs,
    workspace: &Workspace,
    branch: &str,
    args: &Args,
) -> Result<Vec<NaiveDate>> {
    if !args.dates.is_empty() {
        return Ok(args.dates.clone());
    }

    let (first, last) = vcs.commit_date_range(workspace, branch)?.ok_or_else(|| {
        MetricsError::Validation(format!("Could not determine commit dates on {}", branch))
    })?;

    info!("Sampling from {} to {} on {}", first, last, branch);
    Ok(period::enumerate(first, last, args.period))
}

fn run(args: &Args) -> Result<()> {
    let scc = Scc::new(args.scc.clone());
    let vcs = GitCli;
    let workspace =
        collector::prepare_workspace(&vcs, &scc, &args.repo_url, install_interrupt_cleanup)?;

    if args.branch != "HEAD" {
        info!("Checking out branch {}...", args.branch);
    }
    let branch = vcs.resolve_branch(&workspace, &args.branch)?;

    let dates = sample_dates(&vcs, &workspace, &branch, args)?;
    info!("Sampling {} dates", dates.len());

    let table = collector::collect(&vcs, &scc, &workspace, &dates, &branch, args.debug)?;
    if table.is_empty() {
        warn!("No metrics collected for any sample date");
    }

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if args.csv {
        output::write_csv(&table, out)?;
    } else {
        output::write_json(&table, out)?;
    }

    if let Some(plot_path) = &args.plot {
        info!("Generating plot: {}", plot_path.display());
        output::generate_plot(&table, plot_path)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
