//! Configuration types for stale-scan
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Duration and size string parsing

use crate::error::{ConfigError, ConfigResult};
use crate::walker::types::now_epoch;
use crate::walker::{ScanOptions, TimeBasis, DEFAULT_ERROR_LIMIT};
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Regex for durations: amount plus optional unit (days when omitted)
static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([smhdwy]?)\s*$").expect("Invalid duration regex")
});

/// Regex for sizes: amount plus optional alphabetic unit
static SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([a-z]*)\s*$").expect("Invalid size regex")
});

/// Find large directories that have not been touched in a long time
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stale-scan",
    version,
    about = "Find large directories that have not been touched in a long time",
    long_about = "Walks a directory tree, computes the total size and newest timestamp of every\n\
                  directory, and reports the outermost directories that are both large and stale.",
    after_help = "EXAMPLES:\n    \
        stale-scan /data\n    \
        stale-scan /data --older-than 1y --min-size 500g\n    \
        stale-scan /srv --time-basis atime --one-filesystem -w 16\n    \
        stale-scan /home --sort age --html report.html"
)]
pub struct CliArgs {
    /// Root directory to scan
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Age threshold, e.g. 90d, 12w, 1y
    #[arg(long, default_value = "180d", value_name = "DURATION")]
    pub older_than: String,

    /// Minimum directory size, e.g. 500g, 1.5tb
    #[arg(long, default_value = "10g", value_name = "SIZE")]
    pub min_size: String,

    /// Which timestamp to use for recency
    #[arg(long, value_enum, default_value_t = TimeBasis::Modified)]
    pub time_basis: TimeBasis,

    /// Do not cross filesystem boundaries
    #[arg(long)]
    pub one_filesystem: bool,

    /// Follow symlinks (cycle detection enabled)
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Number of worker threads (1 scans on the main thread)
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Maximum number of access errors kept as samples
    #[arg(long, default_value_t = DEFAULT_ERROR_LIMIT, value_name = "NUM")]
    pub error_limit: usize,

    /// Write an HTML report to the given path
    #[arg(long, value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Sort results by size, age, or path
    #[arg(long, value_enum, default_value_t = SortKey::Size)]
    pub sort: SortKey,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    /// Largest first
    #[default]
    Size,
    /// Least recently touched first
    Age,
    /// Lexical by path
    Path,
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Absolute scan root
    pub root: PathBuf,

    /// Engine settings (size threshold, cutoff, traversal flags)
    pub options: ScanOptions,

    /// Instant the cutoff was computed from (epoch seconds)
    pub now: f64,

    /// Number of worker threads
    pub worker_count: usize,

    /// HTML report destination
    pub html_output: Option<PathBuf>,

    /// Result ordering
    pub sort: SortKey,

    /// Show progress indicator
    pub show_progress: bool,
}

impl ScanConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> ConfigResult<Self> {
        Self::from_args_at(args, now_epoch())
    }

    /// Same as [`ScanConfig::from_args`] with an explicit current time
    pub fn from_args_at(args: CliArgs, now: f64) -> ConfigResult<Self> {
        let root = std::path::absolute(&args.path).unwrap_or_else(|_| args.path.clone());
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory { path: root });
        }

        let older_than_secs = parse_duration(&args.older_than)?;
        let min_size = parse_size(&args.min_size)?;

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.error_limit == 0 {
            return Err(ConfigError::InvalidErrorLimit {
                limit: args.error_limit,
            });
        }

        // Validate output path
        if let Some(ref html) = args.html {
            if let Some(parent) = html.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConfigError::InvalidOutputPath {
                        path: html.clone(),
                        reason: format!("Parent directory '{}' does not exist", parent.display()),
                    });
                }
            }
            if html.is_dir() {
                return Err(ConfigError::InvalidOutputPath {
                    path: html.clone(),
                    reason: "Path is a directory".to_string(),
                });
            }
        }

        let options = ScanOptions::new(min_size, now - older_than_secs as f64)
            .with_time_basis(args.time_basis)
            .with_follow_symlinks(args.follow_symlinks)
            .with_one_filesystem(args.one_filesystem)
            .with_error_limit(args.error_limit);

        Ok(Self {
            root,
            options,
            now,
            worker_count: args.workers,
            html_output: args.html,
            sort: args.sort,
            show_progress: !args.quiet,
        })
    }
}

/// Parse a duration such as `90d`, `12h` or `1.5w` into whole seconds
///
/// Units: s, m, h, d, w, y (365 days). No unit means days.
pub fn parse_duration(value: &str) -> ConfigResult<u64> {
    let lowered = value.to_lowercase();
    let invalid = || ConfigError::InvalidDuration {
        value: value.to_string(),
    };

    let caps = DURATION_REGEX.captures(&lowered).ok_or_else(invalid)?;
    let amount: f64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier: u64 = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "" | "d" => 60 * 60 * 24,
        "w" => 60 * 60 * 24 * 7,
        "y" => 60 * 60 * 24 * 365,
        _ => return Err(invalid()),
    };

    Ok((amount * multiplier as f64) as u64)
}

/// Parse a size such as `500g`, `1.5tb` or `200gb` into bytes
///
/// `kb`..`pb` are decimal (powers of 1000); `k`..`p` and `kib`..`pib` are
/// binary (powers of 1024). No unit, `b` or `bytes` means bytes.
pub fn parse_size(value: &str) -> ConfigResult<u64> {
    let lowered = value.to_lowercase();
    let invalid = || ConfigError::InvalidSize {
        value: value.to_string(),
    };

    let caps = SIZE_REGEX.captures(&lowered).ok_or_else(invalid)?;
    let amount: f64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = &caps[2];

    let multiplier: u64 = match unit {
        "" | "b" | "bytes" => 1,
        "kb" => 1000,
        "mb" => 1000u64.pow(2),
        "gb" => 1000u64.pow(3),
        "tb" => 1000u64.pow(4),
        "pb" => 1000u64.pow(5),
        "k" | "kib" => 1 << 10,
        "m" | "mib" => 1 << 20,
        "g" | "gib" => 1 << 30,
        "t" | "tib" => 1 << 40,
        "p" | "pib" => 1 << 50,
        _ => {
            return Err(ConfigError::UnknownSizeUnit {
                unit: unit.to_string(),
            })
        }
    };

    Ok((amount * multiplier as f64) as u64)
}
