//! Stale directory walker
//!
//! This module finds directories whose whole subtree is both large and
//! untouched: every directory gets a total file size and the newest
//! timestamp found anywhere below it.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        Scanner          │
//!                     │  - options + counters   │
//!                     └───────────┬─────────────┘
//!                                 │
//!            workers <= 1         │         workers > 1
//!       ┌─────────────────────────┴─────────────────────────┐
//!       │                                                   │
//! ┌─────▼──────────┐                              ┌─────────▼─────────┐
//! │ SubtreeWalker  │                              │   Coordinator     │
//! │ explicit stack │                              │ one unit per      │
//! │ whole tree     │                              │ root child dir    │
//! └────────────────┘                              └─────────┬─────────┘
//!                                                           │
//!                                               SubtreeWalker per unit
//! ```
//!
//! Both paths produce the same [`ScanReport`] for the same tree; the
//! candidates come back unordered and possibly nested, and
//! [`select_top_level`] reduces them to the outermost ones.

mod coordinator;
pub mod memory;
pub mod probe;
mod scanner;
pub mod select;
mod subtree;
pub mod types;

pub use memory::MemoryFs;
pub use probe::{DirChild, EntryKind, EntryMeta, EntryTimes, FileSystem, LocalFs, TimeBasis};
pub use scanner::{scan, scan_parallel, Scanner};
pub use select::select_top_level;
pub use types::{
    DirectoryAggregate, ErrorLog, ScanCounters, ScanError, ScanProgress, ScanReport, ScanStats,
    DEFAULT_ERROR_LIMIT,
};

/// Filter and traversal settings for one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Minimum subtree size in bytes (inclusive)
    pub min_size: u64,

    /// Latest allowed newest-timestamp, in epoch seconds (inclusive)
    pub cutoff: f64,

    /// Which timestamp counts as "touched"
    pub time_basis: TimeBasis,

    /// Descend into symlinked directories and stat link targets
    pub follow_symlinks: bool,

    /// Stay on the scan root's device
    pub one_filesystem: bool,

    /// Maximum number of error samples kept
    pub error_limit: usize,
}

impl ScanOptions {
    pub fn new(min_size: u64, cutoff: f64) -> Self {
        Self {
            min_size,
            cutoff,
            time_basis: TimeBasis::default(),
            follow_symlinks: false,
            one_filesystem: false,
            error_limit: DEFAULT_ERROR_LIMIT,
        }
    }

    pub fn with_time_basis(mut self, time_basis: TimeBasis) -> Self {
        self.time_basis = time_basis;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_one_filesystem(mut self, one_filesystem: bool) -> Self {
        self.one_filesystem = one_filesystem;
        self
    }

    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = limit;
        self
    }
}
