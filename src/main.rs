//! stale-scan - Stale Directory Finder
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use stale_scan::config::{CliArgs, ScanConfig};
use stale_scan::progress::{poll_while, print_header, ProgressReporter};
use stale_scan::report::{
    describe_criteria, render_text, sort_results, write_html, ReportContext,
};
use stale_scan::walker::{select_top_level, ScanReport, Scanner};
use stale_scan::StaleError;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<StaleError>()
                .map(StaleError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = ScanConfig::from_args(args)
        .map_err(StaleError::from)
        .context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.root,
            &describe_criteria(config.options.cutoff, config.options.min_size),
            config.options.time_basis,
            config.worker_count,
        );
    }

    let scanner = Scanner::new(config.options.clone());
    let start = Instant::now();
    let report = scan_with_progress(&scanner, &config, start);
    let elapsed = start.elapsed();

    let mut results = select_top_level(&report.candidates);
    sort_results(&mut results, config.sort);

    let ctx = ReportContext {
        cutoff: config.options.cutoff,
        min_size: config.options.min_size,
        elapsed,
        now: config.now,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_text(&mut out, &results, &report, &ctx)
        .map_err(StaleError::from)
        .context("Failed to write report")?;

    if let Some(ref path) = config.html_output {
        write_html(path, &results, &report, &ctx).map_err(StaleError::from)?;
        writeln!(out, "HTML report written to {}", path.display())
            .map_err(StaleError::from)?;
    }

    if report.stats.errors > 0 {
        info!(errors = report.stats.errors, "Scan completed with access errors");
    }

    Ok(())
}

/// Run the scan, polling the live counters into a spinner unless quiet
fn scan_with_progress(scanner: &Scanner, config: &ScanConfig, start: Instant) -> ScanReport {
    if !config.show_progress {
        return scanner.scan_parallel(&config.root, config.worker_count);
    }

    let progress = ProgressReporter::new();
    let report = poll_while(
        || progress.update(&scanner.progress(start.elapsed())),
        || scanner.scan_parallel(&config.root, config.worker_count),
    );

    progress.finish_and_clear();
    report
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("stale_scan=debug,warn")
    } else {
        EnvFilter::new("stale_scan=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
