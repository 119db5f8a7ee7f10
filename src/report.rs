//! Report rendering
//!
//! Turns a [`ScanReport`] and its selected results into the plain-text
//! summary printed on stdout and the standalone HTML document written with
//! `--html`.

use crate::config::SortKey;
use crate::error::ReportError;
use crate::walker::{DirectoryAggregate, ScanReport};
use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Scan parameters shown alongside the results
#[derive(Debug, Clone, Copy)]
pub struct ReportContext {
    /// Latest allowed newest-timestamp (epoch seconds)
    pub cutoff: f64,
    /// Minimum size in bytes
    pub min_size: u64,
    /// Wall time the scan took
    pub elapsed: Duration,
    /// Instant ages are measured from (epoch seconds)
    pub now: f64,
}

/// Order results for display
pub fn sort_results(results: &mut [DirectoryAggregate], key: SortKey) {
    match key {
        SortKey::Size => results.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.path.cmp(&b.path))
        }),
        SortKey::Age => results.sort_by(|a, b| {
            a.newest_timestamp
                .total_cmp(&b.newest_timestamp)
                .then_with(|| a.path.cmp(&b.path))
        }),
        SortKey::Path => results.sort_by(|a, b| a.path.cmp(&b.path)),
    }
}

/// `H:MM:SS` when at least an hour, `M:SS` otherwise
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Local calendar date of an epoch timestamp, `YYYY-MM-DD`
pub fn format_timestamp(ts: f64) -> String {
    DateTime::from_timestamp(ts.floor() as i64, 0)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

fn criteria_line(ctx: &ReportContext) -> String {
    describe_criteria(ctx.cutoff, ctx.min_size)
}

/// Criteria summary used by the CLI header
pub fn describe_criteria(cutoff: f64, min_size: u64) -> String {
    format!(
        "last touched before {} and size >= {}",
        format_timestamp(cutoff),
        format_bytes(min_size)
    )
}

/// Write the plain-text report
pub fn render_text<W: Write>(
    out: &mut W,
    results: &[DirectoryAggregate],
    report: &ScanReport,
    ctx: &ReportContext,
) -> io::Result<()> {
    let stats = &report.stats;
    writeln!(
        out,
        "Scanned {} directories, {} files in {}",
        stats.dirs_scanned,
        stats.files_scanned,
        format_elapsed(ctx.elapsed)
    )?;
    writeln!(out, "Criteria: {}", criteria_line(ctx))?;

    if results.is_empty() {
        writeln!(out, "No directories matched the criteria.")?;
    } else {
        writeln!(out, "Flagged {} top-level directories:", results.len())?;
        for item in results {
            writeln!(
                out,
                "- {} | {} | last touched {} ({:.0} days ago)",
                item.path.display(),
                format_bytes(item.size_bytes),
                format_timestamp(item.newest_timestamp),
                item.age_days(ctx.now)
            )?;
        }
    }

    if stats.errors > 0 {
        writeln!(
            out,
            "Warnings: {} access errors. Showing {} sample(s).",
            stats.errors,
            report.errors.len()
        )?;
        for err in &report.errors {
            writeln!(out, "  - {}: {}", err.path.display(), err.message)?;
        }
    }
    if stats.skipped_symlinks > 0 {
        writeln!(out, "Skipped symlinks: {}", stats.skipped_symlinks)?;
    }
    if stats.skipped_other_fs > 0 {
        writeln!(out, "Skipped other filesystems: {}", stats.skipped_other_fs)?;
    }
    Ok(())
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const HTML_STYLE: &str = "\
    body { font-family: Arial, sans-serif; margin: 24px; }
    h1 { margin-bottom: 8px; }
    .meta { color: #555; margin-bottom: 16px; }
    table { border-collapse: collapse; width: 100%; }
    th, td { border: 1px solid #ccc; padding: 8px; text-align: left; }
    th { background: #f6f6f6; }";

/// Render the standalone HTML report
pub fn render_html(
    results: &[DirectoryAggregate],
    report: &ScanReport,
    ctx: &ReportContext,
) -> String {
    let mut rows = String::new();
    for item in results {
        // writing into a String cannot fail
        let _ = write!(
            rows,
            "      <tr>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{:.0}</td>\n      </tr>\n",
            escape_html(&item.path.display().to_string()),
            escape_html(&format_bytes(item.size_bytes)),
            escape_html(&format_timestamp(item.newest_timestamp)),
            item.age_days(ctx.now)
        );
    }
    if rows.is_empty() {
        rows.push_str("      <tr><td colspan=\"4\">No matches</td></tr>\n");
    }

    format!(
        "<!doctype html>
<html lang=\"en\">
<head>
  <meta charset=\"utf-8\" />
  <title>stale-scan report</title>
  <style>
{style}
  </style>
</head>
<body>
  <h1>stale-scan report</h1>
  <div class=\"meta\">Generated {generated}</div>
  <div class=\"meta\">Criteria: {criteria}</div>
  <div class=\"meta\">Scanned {dirs} directories, {files} files in {elapsed}</div>
  <h2>Flagged directories ({count})</h2>
  <table>
    <thead>
      <tr>
        <th>Path</th>
        <th>Size</th>
        <th>Last touched</th>
        <th>Age (days)</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
",
        style = HTML_STYLE,
        generated = escape_html(&format_timestamp(ctx.now)),
        criteria = escape_html(&criteria_line(ctx)),
        dirs = report.stats.dirs_scanned,
        files = report.stats.files_scanned,
        elapsed = escape_html(&format_elapsed(ctx.elapsed)),
        count = results.len(),
        rows = rows,
    )
}

/// Render and write the HTML report to `path`
pub fn write_html(
    path: &Path,
    results: &[DirectoryAggregate],
    report: &ScanReport,
    ctx: &ReportContext,
) -> Result<(), ReportError> {
    fs::write(path, render_html(results, report, ctx)).map_err(|source| ReportError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}
