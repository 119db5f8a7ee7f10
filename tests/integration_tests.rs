//! Integration tests for stale-scan
//!
//! Real on-disk trees are built with tempfile; devices, cycles, failures
//! and very deep trees use the in-memory filesystem.

use stale_scan::walker::types::now_epoch;
use stale_scan::walker::{
    scan, scan_parallel, select_top_level, DirectoryAggregate, EntryTimes, MemoryFs, ScanError,
    ScanOptions, ScanReport, ScanStats, Scanner,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const DAY: f64 = 86_400.0;
const GIB: u64 = 1 << 30;

fn write_file(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![7u8; len]).unwrap();
}

fn find<'a>(report: &'a ScanReport, path: &Path) -> Option<&'a DirectoryAggregate> {
    report.candidates.iter().find(|c| c.path == path)
}

#[test]
fn test_local_tree_exact_sizes() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("top.bin"), 100);
    write_file(&root.join("a/one.bin"), 1000);
    write_file(&root.join("a/b/two.bin"), 2000);
    write_file(&root.join("c/three.bin"), 30);
    fs::create_dir(root.join("empty")).unwrap();

    let options = ScanOptions::new(0, f64::MAX);
    let report = scan(root, &options);

    let summary = report.root_summary.clone().unwrap();
    assert_eq!(summary.size_bytes, 3130);
    assert_eq!(find(&report, &root.join("a")).unwrap().size_bytes, 3000);
    assert_eq!(find(&report, &root.join("a/b")).unwrap().size_bytes, 2000);
    assert_eq!(find(&report, &root.join("empty")).unwrap().size_bytes, 0);
    assert_eq!(report.stats.dirs_scanned, 5);
    assert_eq!(report.stats.files_scanned, 4);
    assert_eq!(report.stats.errors, 0);

    let parallel = scan_parallel(root, &options, 4);
    assert_eq!(parallel.root_summary.unwrap().size_bytes, 3130);
    assert_eq!(parallel.stats, report.stats);
}

#[test]
fn test_local_fresh_tree_yields_nothing() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a/data.bin"), 4096);

    // everything was written moments ago
    let options = ScanOptions::new(0, now_epoch() - 3600.0);
    let report = scan(dir.path(), &options);
    assert!(report.candidates.is_empty());
    assert!(report.root_summary.is_some());
}

#[test]
fn test_missing_root_reports_one_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("not-here");

    let report = scan(&missing, &ScanOptions::new(0, f64::MAX));
    assert!(report.candidates.is_empty());
    assert!(report.root_summary.is_none());
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.errors.len(), 1);

    let parallel = scan_parallel(&missing, &ScanOptions::new(0, f64::MAX), 4);
    assert_eq!(parallel.stats, report.stats);
}

#[cfg(unix)]
#[test]
fn test_local_symlink_cycle() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("a/data.bin"), 10);
    std::os::unix::fs::symlink(root, root.join("a/loop")).unwrap();

    let following = ScanOptions::new(0, f64::MAX).with_follow_symlinks(true);
    let report = scan(root, &following);
    assert_eq!(report.stats.skipped_symlinks, 1);
    assert_eq!(report.root_summary.unwrap().size_bytes, 10);

    let not_following = ScanOptions::new(0, f64::MAX);
    let report = scan(root, &not_following);
    assert_eq!(report.stats.skipped_symlinks, 1);
    assert_eq!(report.root_summary.unwrap().size_bytes, 10);
}

#[test]
fn test_stale_and_large_scenario() {
    let now = now_epoch();
    let old = now - 200.0 * DAY;
    let recent = now - 5.0 * DAY;

    let mut fs = MemoryFs::with_default_time(old);
    fs.add_dir("/root", old)
        .add_dir("/root/a", old)
        .add_file("/root/a/f1", 3 * GIB, old)
        .add_file("/root/a/f2", 2 * GIB, old)
        .add_dir("/root/b", old)
        .add_file("/root/b/f3", GIB, recent);

    let options = ScanOptions::new(4 * GIB, now - 90.0 * DAY);
    let scanner = Scanner::with_filesystem(fs, options);

    for report in [
        scanner.scan(Path::new("/root")),
        scanner.scan_parallel(Path::new("/root"), 4),
    ] {
        let selected = select_top_level(&report.candidates);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].path, PathBuf::from("/root/a"));
        assert_eq!(selected[0].size_bytes, 5 * GIB);

        let root = report.root_summary.unwrap();
        assert_eq!(root.size_bytes, 6 * GIB);
        assert_eq!(root.newest_timestamp, recent);
    }
}

#[test]
fn test_nested_stale_dirs_collapse_to_outermost() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0)
        .add_file("/r/x/y/z/big", 100, 1.0)
        .add_file("/r/fresh/f", 1, 500.0);

    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(50, 100.0));
    let report = scanner.scan(Path::new("/r"));
    assert_eq!(report.candidates.len(), 3);

    let selected = select_top_level(&report.candidates);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].path, PathBuf::from("/r/x"));
}

#[test]
fn test_one_filesystem_excludes_mounts() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0)
        .add_file("/r/local/f", 10, 1.0)
        .add_mount("/r/mnt", 2, 1.0)
        .add_file("/r/mnt/remote", 1000, 1.0)
        .add_mount("/r/local/nested", 3, 1.0)
        .add_file("/r/local/nested/g", 500, 1.0);

    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(0, 10.0).with_one_filesystem(true));
    for report in [
        scanner.scan(Path::new("/r")),
        scanner.scan_parallel(Path::new("/r"), 3),
    ] {
        assert_eq!(report.stats.skipped_other_fs, 2);
        assert_eq!(report.root_summary.clone().unwrap().size_bytes, 10);
        assert!(find(&report, Path::new("/r/mnt")).is_none());
    }
}

#[test]
fn test_memory_symlink_cycle_terminates() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0)
        .add_file("/r/a/f", 5, 1.0)
        .add_symlink("/r/a/up", "/r")
        .add_symlink("/r/b", "/r/a");

    let options = ScanOptions::new(0, 10.0).with_follow_symlinks(true);
    let scanner = Scanner::with_filesystem(fs, options);

    let report = scanner.scan(Path::new("/r"));
    // /r/a is reached once directly and once through /r/b
    assert_eq!(report.root_summary.unwrap().size_bytes, 5);
    assert_eq!(report.stats.skipped_symlinks, 2);
    assert_eq!(report.stats.dirs_scanned, 2);

    for workers in [1, 2, 4] {
        let parallel = scanner.scan_parallel(Path::new("/r"), workers);
        assert_eq!(parallel.root_summary.unwrap().size_bytes, 5, "workers {}", workers);
        assert_eq!(parallel.stats, report.stats, "workers {}", workers);
    }
}

#[test]
fn test_directory_shared_by_two_children_counts_once() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0)
        .add_file("/r/a/big", 100, 1.0)
        .add_symlink("/r/b", "/r/a");

    let options = ScanOptions::new(150, 10.0).with_follow_symlinks(true);
    let scanner = Scanner::with_filesystem(fs, options);

    let serial = scanner.scan(Path::new("/r"));
    let parallel = scanner.scan_parallel(Path::new("/r"), 4);
    for report in [&serial, &parallel] {
        assert_eq!(report.root_summary.as_ref().unwrap().size_bytes, 100);
        assert_eq!(report.stats.dirs_scanned, 2);
        assert_eq!(report.stats.files_scanned, 1);
        assert_eq!(report.stats.skipped_symlinks, 1);
        assert!(report.candidates.is_empty());
    }
}

#[test]
fn test_deep_chain_does_not_overflow() {
    const DEPTH: usize = 10_000;

    let mut path = PathBuf::from("/deep");
    for _ in 0..DEPTH {
        path.push("d");
    }
    let mut fs = MemoryFs::new();
    fs.add_dir("/deep", 1.0).add_file(path.join("leaf"), 42, 50.0);

    // fresh leaf keeps every level out of the candidate list
    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(0, 10.0));
    let report = scanner.scan(Path::new("/deep"));

    assert_eq!(report.stats.dirs_scanned, DEPTH as u64 + 1);
    assert_eq!(report.stats.files_scanned, 1);
    assert!(report.candidates.is_empty());
    let root = report.root_summary.unwrap();
    assert_eq!(root.size_bytes, 42);
    assert_eq!(root.newest_timestamp, 50.0);
}

#[test]
fn test_failures_never_look_stale() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0)
        .add_file("/r/locked/inner/f", 10 * GIB, 1.0)
        .deny_listing("/r/locked/inner")
        .add_file("/r/partial/ok", 10 * GIB, 1.0)
        .add_file("/r/partial/hidden", 1, 1.0)
        .deny_stat("/r/partial/hidden")
        .add_file("/r/clean/f", 10 * GIB, 1.0);

    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(GIB, 100.0));
    let report = scanner.scan(Path::new("/r"));

    assert_eq!(report.stats.errors, 2);
    let selected = select_top_level(&report.candidates);
    let paths: Vec<_> = selected.iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths, vec![PathBuf::from("/r/clean")]);
}

#[test]
fn test_error_totals_exceed_sample_cap() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0);
    for d in 0..5 {
        for f in 0..10 {
            let path = format!("/r/d{}/f{}", d, f);
            fs.add_file(&path, 1, 1.0).deny_stat(&path);
        }
    }

    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(0, 10.0).with_error_limit(7));
    for report in [
        scanner.scan(Path::new("/r")),
        scanner.scan_parallel(Path::new("/r"), 3),
    ] {
        assert_eq!(report.stats.errors, 50);
        assert_eq!(report.errors.len(), 7);
    }
}

/// Small deterministic generator for synthetic trees
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const BASE_TIME: f64 = 1_000_000_000.0;

fn synthetic_tree(seed: u64) -> MemoryFs {
    let mut rng = Lcg(seed);
    let mut fs = MemoryFs::with_default_time(BASE_TIME);
    fs.add_dir("/t", BASE_TIME);

    let mut dirs = vec![PathBuf::from("/t")];
    let mut pending = vec![(PathBuf::from("/t"), 0u32)];
    while let Some((dir, depth)) = pending.pop() {
        for f in 0..rng.below(6) {
            let path = dir.join(format!("f{}", f));
            let time = BASE_TIME + rng.below(1000) as f64 * DAY;
            fs.add_file(&path, rng.below(1 << 20), time);
            if rng.below(25) == 0 {
                fs.deny_stat(&path);
            }
        }
        if depth >= 4 {
            continue;
        }
        for d in 0..rng.below(5) {
            let path = dir.join(format!("d{}", d));
            let time = BASE_TIME + rng.below(1000) as f64 * DAY;
            if rng.below(40) == 0 {
                fs.add_mount(&path, 7, time);
            } else {
                fs.add_dir(&path, time);
            }
            if rng.below(30) == 0 {
                fs.deny_listing(&path);
            }
            dirs.push(path.clone());
            pending.push((path, depth + 1));
        }
    }

    // Links between arbitrary directories: cycles, back edges to the root,
    // and paths into sibling subtrees
    for i in 0..rng.below(6) {
        let holder = &dirs[rng.below(dirs.len() as u64) as usize];
        let target = &dirs[rng.below(dirs.len() as u64) as usize];
        fs.add_symlink(holder.join(format!("l{}", i)), target);
    }
    fs
}

/// Timestamps raised to "now" by failures differ between runs; fold them together
fn normalize_time(ts: f64) -> f64 {
    if ts > BASE_TIME + 2000.0 * DAY {
        f64::INFINITY
    } else {
        ts
    }
}

fn normalized(report: &ScanReport) -> (Vec<DirectoryAggregate>, Vec<ScanError>, ScanStats, Option<DirectoryAggregate>) {
    let fix = |c: &DirectoryAggregate| {
        DirectoryAggregate::new(c.path.clone(), c.size_bytes, normalize_time(c.newest_timestamp))
    };
    let mut candidates: Vec<_> = report.candidates.iter().map(fix).collect();
    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    let mut errors = report.errors.clone();
    errors.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
    (candidates, errors, report.stats, report.root_summary.as_ref().map(fix))
}

#[test]
fn test_parallel_matches_serial_on_synthetic_trees() {
    for seed in [1u64, 7, 42, 1234, 98_765] {
        for one_filesystem in [false, true] {
            let options = ScanOptions::new(256 * 1024, BASE_TIME + 500.0 * DAY)
                .with_one_filesystem(one_filesystem)
                .with_error_limit(10_000);
            let scanner = Scanner::with_filesystem(synthetic_tree(seed), options);

            let serial = normalized(&scanner.scan(Path::new("/t")));
            for workers in 1..=8 {
                let parallel = normalized(&scanner.scan_parallel(Path::new("/t"), workers));
                assert_eq!(
                    serial, parallel,
                    "seed {} workers {} one_filesystem {}",
                    seed, workers, one_filesystem
                );
            }
        }
    }
}

#[test]
fn test_parallel_totals_match_serial_when_following_symlinks() {
    for seed in [1u64, 7, 42, 1234, 98_765, 31_337] {
        for one_filesystem in [false, true] {
            let options = ScanOptions::new(256 * 1024, BASE_TIME + 500.0 * DAY)
                .with_one_filesystem(one_filesystem)
                .with_follow_symlinks(true)
                .with_error_limit(10_000);
            let scanner = Scanner::with_filesystem(synthetic_tree(seed), options);

            // A directory reachable along several paths is credited to whichever
            // walk enters it first, so only whole-scan totals are comparable
            let (_, _, serial_stats, serial_root) = normalized(&scanner.scan(Path::new("/t")));
            for workers in 1..=8 {
                let (_, _, stats, root) =
                    normalized(&scanner.scan_parallel(Path::new("/t"), workers));
                assert_eq!(
                    (serial_stats, &serial_root),
                    (stats, &root),
                    "seed {} workers {} one_filesystem {}",
                    seed, workers, one_filesystem
                );
            }
        }
    }
}

#[test]
fn test_parallel_handles_root_without_subdirectories() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0).add_file("/r/a", 5, 1.0).add_file("/r/b", 6, 2.0);

    let scanner = Scanner::with_filesystem(fs, ScanOptions::new(0, 10.0));
    let report = scanner.scan_parallel(Path::new("/r"), 8);
    let root = report.root_summary.unwrap();
    assert_eq!(root.size_bytes, 11);
    assert_eq!(root.newest_timestamp, 2.0);
    assert_eq!(report.candidates.len(), 1);
}

#[test]
fn test_time_basis_changes_outcome() {
    let mut fs = MemoryFs::new();
    fs.add_dir("/r", 1.0).add_file("/r/a/f", 100, 1.0);
    fs.set_times(
        "/r/a/f",
        EntryTimes {
            modified: 1.0,
            accessed: 1.0,
            changed: 900.0,
        },
    );

    let by_mtime = Scanner::with_filesystem(&fs, ScanOptions::new(0, 100.0)).scan(Path::new("/r"));
    assert_eq!(select_top_level(&by_mtime.candidates)[0].path, PathBuf::from("/r"));

    let by_ctime = Scanner::with_filesystem(
        &fs,
        ScanOptions::new(0, 100.0).with_time_basis(stale_scan::walker::TimeBasis::Changed),
    )
    .scan(Path::new("/r"));
    assert!(by_ctime.candidates.is_empty());
}
