//! Scan entry points
//!
//! [`Scanner`] bundles the options, the filesystem and the live counters
//! of one scan. The free functions [`scan`] and [`scan_parallel`] are the
//! one-shot forms over the local disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use super::coordinator::Coordinator;
use super::probe::{FileSystem, LocalFs};
use super::subtree::{SubtreeWalker, WalkStart};
use super::types::{now_epoch, ScanCounters, ScanProgress, ScanReport};
use super::ScanOptions;

/// Runs scans over one filesystem with one set of options
pub struct Scanner<F: FileSystem = LocalFs> {
    fs: F,
    options: ScanOptions,
    counters: Arc<ScanCounters>,
}

impl Scanner<LocalFs> {
    pub fn new(options: ScanOptions) -> Self {
        Self::with_filesystem(LocalFs, options)
    }
}

impl<F: FileSystem> Scanner<F> {
    pub fn with_filesystem(fs: F, options: ScanOptions) -> Self {
        Self {
            fs,
            options,
            counters: Arc::new(ScanCounters::default()),
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Live counters, shareable with a progress display thread
    pub fn counters(&self) -> Arc<ScanCounters> {
        Arc::clone(&self.counters)
    }

    pub fn progress(&self, elapsed: Duration) -> ScanProgress {
        self.counters.snapshot(elapsed)
    }

    /// Scan `root` on the calling thread
    pub fn scan(&self, root: &Path) -> ScanReport {
        let start = Instant::now();
        info!(root = %root.display(), "Starting scan");

        let walker = SubtreeWalker::new(&self.fs, &self.options, &self.counters, now_epoch());
        let report = walker.walk(WalkStart::scan_root(root)).into_report();

        log_finished(&report, start);
        report
    }

    /// Scan `root`, walking each of its child directories on a pool of up to `workers` threads
    ///
    /// Produces the same report as [`Scanner::scan`] apart from the order of
    /// `candidates`.
    pub fn scan_parallel(&self, root: &Path, workers: usize) -> ScanReport
    where
        F: Sync,
    {
        if workers <= 1 {
            return self.scan(root);
        }

        let start = Instant::now();
        info!(root = %root.display(), workers, "Starting parallel scan");

        let coordinator =
            Coordinator::new(&self.fs, &self.options, &self.counters, now_epoch(), workers);
        let report = coordinator.run(root);

        log_finished(&report, start);
        report
    }
}

fn log_finished(report: &ScanReport, start: Instant) {
    info!(
        dirs = report.stats.dirs_scanned,
        files = report.stats.files_scanned,
        candidates = report.candidates.len(),
        errors = report.stats.errors,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Scan finished"
    );
}

fn absolute_root(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Scan a local directory tree on the calling thread
pub fn scan(root: &Path, options: &ScanOptions) -> ScanReport {
    Scanner::new(options.clone()).scan(&absolute_root(root))
}

/// Scan a local directory tree with up to `workers` threads
pub fn scan_parallel(root: &Path, options: &ScanOptions, workers: usize) -> ScanReport {
    Scanner::new(options.clone()).scan_parallel(&absolute_root(root), workers)
}
