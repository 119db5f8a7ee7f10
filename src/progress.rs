//! Progress reporting for the directory scanner
//!
//! Provides a live spinner fed from [`ScanProgress`] snapshots, plus the
//! styled header printed before a scan starts.

use crate::walker::{ScanProgress, TimeBasis};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// How often the display thread polls the scan counters
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Progress reporter that displays scan status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(POLL_INTERVAL);

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &ScanProgress) {
        self.bar.set_message(progress_message(progress));
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_message(progress: &ScanProgress) -> String {
    let mut msg = format!(
        "Dirs: {} | Files: {} | Size: {} | Rate: {:.0}/s",
        format_number(progress.dirs),
        format_number(progress.files),
        format_size(progress.bytes, BINARY),
        progress.entries_per_second(),
    );
    if progress.errors > 0 {
        msg.push_str(&format!(" | Errors: {}", format_number(progress.errors)));
    }
    msg
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Run `work` while a background thread calls `poll` every [`POLL_INTERVAL`]
///
/// The poller is stopped when `work` returns and also when it unwinds, so a
/// panicking scan propagates instead of leaving the scope waiting forever.
pub fn poll_while<T>(poll: impl Fn() + Sync, work: impl FnOnce() -> T) -> T {
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                poll();
                thread::sleep(POLL_INTERVAL);
            }
        });

        let _stop = StopOnDrop(&done);
        work()
    })
}

/// Raises the flag when dropped
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Print a header at the start of the scan
///
/// Goes to stderr so the report on stdout stays clean for piping.
pub fn print_header(root: &Path, criteria: &str, time_basis: TimeBasis, workers: usize) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("stale-scan").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Root:").bold(), root.display());
    eprintln!("  {} {}", style("Criteria:").bold(), criteria);
    eprintln!("  {} {}", style("Time basis:").bold(), time_basis.label());
    eprintln!("  {} {}", style("Workers:").bold(), workers);
    eprintln!();
}
