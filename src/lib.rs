//! stale-scan - Stale Directory Finder
//!
//! Finds the directories in a tree that are both large and untouched for a
//! long time, and reports the outermost ones so a single cleanup decision
//! covers everything below them.
//!
//! # Features
//!
//! - **Subtree Aggregates**: Every directory gets the total size of the
//!   regular files below it and the newest timestamp anywhere in it.
//!
//! - **Bounded Memory**: The walker uses an explicit stack, so arbitrarily
//!   deep trees never touch the thread's call stack.
//!
//! - **Parallel Scanning**: Each child of the scan root can be walked on its
//!   own worker thread; results are identical to a single-threaded scan.
//!
//! - **Failure Tolerant**: Unreadable entries are recorded, never fatal,
//!   and make their directory look freshly touched rather than stale.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    CLI (config, progress)                    │
//! │     thresholds parsed → ScanOptions + worker count           │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Scanner                            │
//! │   ┌────────────┐   ┌────────────┐          ┌────────────┐    │
//! │   │  Subtree   │   │  Subtree   │   ...    │  Subtree   │    │
//! │   │  Walker    │   │  Walker    │          │  Walker    │    │
//! │   └─────┬──────┘   └─────┬──────┘          └─────┬──────┘    │
//! │         └────────────────┼───────────────────────┘           │
//! │                          ▼                                   │
//! │                 ScanReport (candidates, errors, stats)       │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!                                ▼
//!                    select_top_level → text / HTML report
//! ```
//!
//! # Example
//!
//! ```bash
//! # Directories over 10 GiB untouched for 180 days (the defaults)
//! stale-scan /data
//!
//! # A year by access time, staying on one filesystem
//! stale-scan /srv --older-than 1y --time-basis atime --one-filesystem
//!
//! # HTML output sorted by age
//! stale-scan /home --min-size 500g --sort age --html stale.html
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod report;
pub mod walker;

pub use config::{CliArgs, ScanConfig, SortKey};
pub use error::{ConfigError, ReportError, Result, StaleError, WorkerError};
pub use walker::{
    scan, scan_parallel, select_top_level, DirectoryAggregate, ScanError, ScanOptions, ScanReport,
    ScanStats, Scanner,
};
