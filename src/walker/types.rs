//! Scan result types
//!
//! Everything here is a plain value owned by the caller once a scan
//! returns. The only exception is [`ScanCounters`], the relaxed atomics the
//! walkers bump while running so the CLI can show a live spinner.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default number of error samples kept per scan
pub const DEFAULT_ERROR_LIMIT: usize = 200;

/// Seconds since the Unix epoch as a float (negative before 1970)
pub fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Current wall-clock time as epoch seconds
pub fn now_epoch() -> f64 {
    epoch_seconds(SystemTime::now())
}

/// Total size and newest timestamp attributed to one directory subtree
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryAggregate {
    /// Directory path
    pub path: PathBuf,

    /// Sum of regular file sizes under `path`
    pub size_bytes: u64,

    /// Newest timestamp observed under `path` (epoch seconds)
    pub newest_timestamp: f64,
}

impl DirectoryAggregate {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, newest_timestamp: f64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            newest_timestamp,
        }
    }

    /// Whether this directory is at least `min_size` bytes and untouched since `cutoff`
    pub fn matches(&self, min_size: u64, cutoff: f64) -> bool {
        self.size_bytes >= min_size && self.newest_timestamp <= cutoff
    }

    /// Age of the newest timestamp relative to `now`, in days
    pub fn age_days(&self, now: f64) -> f64 {
        (now - self.newest_timestamp) / 86_400.0
    }
}

/// An entry that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

impl ScanError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Append-only error list with a sample cap and an exact total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<ScanError>,
    total: u64,
    limit: usize,
}

impl ErrorLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            total: 0,
            limit,
        }
    }

    /// Count an error, keeping it only while under the cap
    pub fn record(&mut self, path: &Path, message: impl Into<String>) {
        self.total += 1;
        if self.entries.len() < self.limit {
            self.entries.push(ScanError::new(path, message));
        }
    }

    /// Fold another log in: totals add up exactly, samples fill the remaining room
    pub fn absorb(&mut self, other: ErrorLog) {
        self.total += other.total;
        let room = self.limit.saturating_sub(self.entries.len());
        self.entries.extend(other.entries.into_iter().take(room));
    }

    /// Errors seen, including those past the cap
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn entries(&self) -> &[ScanError] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ScanError> {
        self.entries
    }
}

/// Counters for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub dirs_scanned: u64,
    pub files_scanned: u64,
    pub skipped_symlinks: u64,
    pub skipped_other_fs: u64,
    pub errors: u64,
}

impl ScanStats {
    /// Add another set of counters into this one
    pub fn merge(&mut self, other: &ScanStats) {
        self.dirs_scanned += other.dirs_scanned;
        self.files_scanned += other.files_scanned;
        self.skipped_symlinks += other.skipped_symlinks;
        self.skipped_other_fs += other.skipped_other_fs;
        self.errors += other.errors;
    }
}

/// Outcome of one scan invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Directories meeting the size and age criteria (unordered, possibly nested)
    pub candidates: Vec<DirectoryAggregate>,

    /// Error sample, capped at the configured limit
    pub errors: Vec<ScanError>,

    /// Scan counters; `stats.errors` is the exact error total
    pub stats: ScanStats,

    /// Aggregate for the scan root, absent when the root was unreachable
    pub root_summary: Option<DirectoryAggregate>,
}

impl ScanReport {
    /// Report for a scan whose root could not be read
    pub fn unreachable_root(errors: ErrorLog) -> Self {
        Self {
            candidates: Vec::new(),
            stats: ScanStats {
                errors: errors.total(),
                ..ScanStats::default()
            },
            errors: errors.into_entries(),
            root_summary: None,
        }
    }
}

/// Live counters shared by all walkers of one scanner
#[derive(Debug, Default)]
pub struct ScanCounters {
    dirs: AtomicU64,
    files: AtomicU64,
    bytes: AtomicU64,
    errors: AtomicU64,
}

impl ScanCounters {
    pub(crate) fn record_dir(&self) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view for display
    pub fn snapshot(&self, elapsed: Duration) -> ScanProgress {
        ScanProgress {
            dirs: self.dirs.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub dirs: u64,
    pub files: u64,
    pub bytes: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Entries (files and directories) per second
    pub fn entries_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.files + self.dirs) as f64 / secs
        } else {
            0.0
        }
    }
}
