//! Fan-out coordinator - splits a scan across worker threads
//!
//! The coordinator is responsible for:
//! - Reading the scan root and folding in its direct files itself
//! - Handing each immediate child directory to a worker as one unit
//! - Collecting the sub-walk outcomes and merging them into one report
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │       Coordinator        │
//!                  │  - stat + list the root  │
//!                  │  - root files inline     │
//!                  └────────────┬─────────────┘
//!                               │ child dirs (sorted)
//!                               ▼
//!                  ┌──────────────────────────┐
//!                  │  Unit queue (crossbeam)  │
//!                  └────────────┬─────────────┘
//!       ┌───────────────────────┼───────────────────────┐
//! ┌─────▼─────┐           ┌─────▼─────┐           ┌─────▼─────┐
//! │ Worker 0  │           │ Worker 1  │    ...    │ Worker N  │
//! │ sub-walk  │           │ sub-walk  │           │ sub-walk  │
//! └─────┬─────┘           └─────┬─────┘           └─────┬─────┘
//!       └───────────────────────┼───────────────────────┘
//!                               ▼
//!                 merge in child order → ScanReport
//! ```
//!
//! The split happens only at the root: each worker owns its subtree's
//! traversal state. The one shared structure is the set of directories
//! already entered, consulted only when following symlinks, so a directory
//! reachable from two root children is walked by whichever worker gets
//! there first and skipped by the other.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::probe::FileSystem;
use super::subtree::{DirIdentity, SubtreeOutcome, SubtreeWalker, Tally, WalkStart};
use super::types::{DirectoryAggregate, ScanCounters, ScanReport};
use super::ScanOptions;
use crate::error::WorkerError;

/// One child directory handed to a worker
#[derive(Debug, Clone)]
struct Unit {
    index: usize,
    path: PathBuf,
}

/// A finished unit
struct UnitResult {
    index: usize,
    path: PathBuf,
    outcome: Result<SubtreeOutcome, WorkerError>,
}

/// Splits one scan across a bounded pool of worker threads
pub(crate) struct Coordinator<'a, F: FileSystem + Sync + ?Sized> {
    walker: SubtreeWalker<'a, F>,
    options: &'a ScanOptions,
    worker_count: usize,
}

impl<'a, F: FileSystem + Sync + ?Sized> Coordinator<'a, F> {
    pub fn new(
        fs: &'a F,
        options: &'a ScanOptions,
        counters: &'a ScanCounters,
        now: f64,
        worker_count: usize,
    ) -> Self {
        Self {
            walker: SubtreeWalker::new(fs, options, counters, now),
            options,
            worker_count,
        }
    }

    /// Run the scan rooted at `root`
    pub fn run(&self, root: &Path) -> ScanReport {
        let prober = self.walker.prober();
        let now = prober.now();
        let mut tally = Tally::new(self.options.error_limit);

        let root_meta = match prober.stat(root) {
            Ok(meta) => meta,
            Err(e) => {
                error!(path = %root.display(), error = %e, "Cannot read scan root");
                self.walker.record_error(&mut tally, root, &e);
                return SubtreeOutcome {
                    candidates: Vec::new(),
                    tally,
                    root_summary: None,
                }
                .into_report();
            }
        };

        let root_device = self.options.one_filesystem.then_some(root_meta.device);
        let root_identity = root_meta
            .identity()
            .filter(|_| self.options.follow_symlinks);
        let visited: Mutex<HashSet<DirIdentity>> = Mutex::new(root_identity.into_iter().collect());

        tally.stats.dirs_scanned += 1;
        self.walker.counters().record_dir();

        let mut children = Vec::new();
        let (mut size, mut newest) = self.walker.scan_listing(
            root,
            prober.timestamp(&root_meta),
            root_device,
            &mut tally,
            |child| children.push(child),
        );
        children.sort();

        let mut candidates = Vec::new();
        for result in self.dispatch(children, root_device, &visited) {
            match result.outcome {
                Ok(outcome) => {
                    tally.stats.merge(&outcome.tally.stats);
                    tally.errors.absorb(outcome.tally.errors);
                    candidates.extend(outcome.candidates);
                    // None when the child resolves to a directory another walk
                    // already entered; its bytes are credited there
                    if let Some(summary) = outcome.root_summary {
                        size += summary.size_bytes;
                        newest = newest.max(summary.newest_timestamp);
                    }
                }
                Err(e) => {
                    error!(path = %result.path.display(), error = %e, "Subtree scan failed");
                    tally.errors.record(&result.path, e.to_string());
                    self.walker.counters().record_error();
                    newest = newest.max(now);
                }
            }
        }

        let summary = DirectoryAggregate::new(root, size, newest);
        if summary.matches(self.options.min_size, self.options.cutoff) {
            candidates.push(summary.clone());
        }

        SubtreeOutcome {
            candidates,
            tally,
            root_summary: Some(summary),
        }
        .into_report()
    }

    /// Walk every child on the pool; results come back in child order
    fn dispatch(
        &self,
        children: Vec<PathBuf>,
        root_device: Option<u64>,
        visited: &Mutex<HashSet<DirIdentity>>,
    ) -> Vec<UnitResult> {
        if children.is_empty() {
            return Vec::new();
        }

        let unit_count = children.len();
        let worker_count = self.worker_count.clamp(1, unit_count);
        info!(
            units = unit_count,
            workers = worker_count,
            "Dispatching subtrees"
        );

        let (unit_tx, unit_rx) = unbounded::<Unit>();
        let (result_tx, result_rx) = unbounded::<UnitResult>();
        for (index, path) in children.into_iter().enumerate() {
            // receiver is alive in this scope, send cannot fail
            let _ = unit_tx.send(Unit { index, path });
        }
        drop(unit_tx);

        let mut results: Vec<Option<UnitResult>> = (0..unit_count).map(|_| None).collect();

        thread::scope(|scope| {
            let mut spawned = 0usize;
            for id in 0..worker_count {
                let unit_rx = unit_rx.clone();
                let result_tx = result_tx.clone();
                let spawn = thread::Builder::new()
                    .name(format!("scan-worker-{}", id))
                    .spawn_scoped(scope, move || {
                        self.worker_loop(id, unit_rx, result_tx, root_device, visited)
                    });
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) => {
                        let err = WorkerError::SpawnFailed {
                            id,
                            reason: e.to_string(),
                        };
                        warn!(error = %err, "Continuing with fewer workers");
                    }
                }
            }

            if spawned == 0 {
                warn!("No worker thread could be started, scanning inline");
                self.worker_loop(0, unit_rx.clone(), result_tx.clone(), root_device, visited);
            }
            drop(result_tx);

            for result in result_rx.iter() {
                let index = result.index;
                results[index] = Some(result);
            }
        });

        results.into_iter().flatten().collect()
    }

    fn worker_loop(
        &self,
        id: usize,
        units: Receiver<Unit>,
        results: Sender<UnitResult>,
        root_device: Option<u64>,
        visited: &Mutex<HashSet<DirIdentity>>,
    ) {
        debug!(worker = id, "Worker starting");

        for unit in units.iter() {
            let start = WalkStart::child(unit.path.clone(), root_device, visited);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.walker.walk(start)))
                .map_err(|payload| WorkerError::Panicked {
                    path: unit.path.clone(),
                    message: panic_message(payload.as_ref()),
                });

            debug!(worker = id, path = %unit.path.display(), ok = outcome.is_ok(), "Subtree finished");

            let sent = results.send(UnitResult {
                index: unit.index,
                path: unit.path,
                outcome,
            });
            if sent.is_err() {
                break;
            }
        }

        debug!(worker = id, "Worker finished");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::probe::{DirListing, EntryMeta};
    use crate::walker::MemoryFs;
    use std::io;

    const NOW: f64 = 1_000_000.0;

    fn run(fs: &(impl FileSystem + Sync), root: &str, opts: &ScanOptions, workers: usize) -> ScanReport {
        let counters = ScanCounters::default();
        Coordinator::new(fs, opts, &counters, NOW, workers).run(Path::new(root))
    }

    /// Panics when asked to list one specific directory
    struct Exploding {
        inner: MemoryFs,
        poison: PathBuf,
    }

    impl FileSystem for Exploding {
        fn metadata(&self, path: &Path, follow_symlinks: bool) -> io::Result<EntryMeta> {
            self.inner.metadata(path, follow_symlinks)
        }

        fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
            if path == self.poison {
                panic!("listing exploded");
            }
            self.inner.read_dir(path)
        }
    }

    #[test]
    fn test_root_files_are_aggregated_inline() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/r", 1.0)
            .add_file("/r/one", 3, 1.0)
            .add_file("/r/two", 4, 1.0);

        let report = run(&fs, "/r", &ScanOptions::new(0, NOW), 4);
        let root = report.root_summary.unwrap();
        assert_eq!(root.size_bytes, 7);
        assert_eq!(report.stats.dirs_scanned, 1);
        assert_eq!(report.stats.files_scanned, 2);
        assert_eq!(report.candidates.len(), 1);
    }

    #[test]
    fn test_children_merge_into_root() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/r", 1.0);
        for i in 0..6 {
            fs.add_dir(format!("/r/c{}", i), 1.0)
                .add_file(format!("/r/c{}/f", i), 10, 2.0)
                .add_file(format!("/r/c{}/sub/g", i), 5, 3.0);
        }

        let report = run(&fs, "/r", &ScanOptions::new(0, NOW), 3);
        let root = report.root_summary.clone().unwrap();
        assert_eq!(root.size_bytes, 90);
        assert_eq!(root.newest_timestamp, 3.0);
        // root + 6 children + 6 grandchildren
        assert_eq!(report.stats.dirs_scanned, 13);
        assert_eq!(report.candidates.len(), 13);
    }

    #[test]
    fn test_panicking_unit_is_isolated() {
        let mut inner = MemoryFs::new();
        inner
            .add_dir("/r", 1.0)
            .add_file("/r/good/f", 10, 1.0)
            .add_file("/r/bad/f", 1000, 1.0)
            .add_file("/r/other/f", 20, 1.0);
        let fs = Exploding {
            inner,
            poison: PathBuf::from("/r/bad"),
        };

        let report = run(&fs, "/r", &ScanOptions::new(0, NOW + 1.0), 2);
        let root = report.root_summary.unwrap();
        assert_eq!(root.size_bytes, 30);
        assert_eq!(root.newest_timestamp, NOW);
        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.errors[0].path, PathBuf::from("/r/bad"));
        assert!(report.errors[0].message.contains("listing exploded"));
        assert!(report
            .candidates
            .iter()
            .any(|c| c.path == Path::new("/r/good")));
    }

    #[test]
    fn test_unreachable_root() {
        let fs = MemoryFs::new();
        let report = run(&fs, "/nope", &ScanOptions::new(0, NOW), 4);
        assert!(report.root_summary.is_none());
        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.dirs_scanned, 0);
    }

    #[test]
    fn test_error_samples_follow_child_order() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/r", 1.0);
        for name in ["c", "a", "b"] {
            let file = format!("/r/{}/locked", name);
            fs.add_file(&file, 1, 1.0).deny_stat(&file);
        }

        let opts = ScanOptions::new(0, NOW).with_error_limit(2);
        let report = run(&fs, "/r", &opts, 3);
        assert_eq!(report.stats.errors, 3);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/r/a/locked"), PathBuf::from("/r/b/locked")]
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_symlinked_sibling_is_walked_once() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/r", 1.0)
            .add_file("/r/a/big", 100, 1.0)
            .add_symlink("/r/b", "/r/a");

        let opts = ScanOptions::new(150, NOW).with_follow_symlinks(true);
        for workers in [1, 2, 4] {
            let report = run(&fs, "/r", &opts, workers);
            assert_eq!(report.root_summary.unwrap().size_bytes, 100);
            assert_eq!(report.stats.dirs_scanned, 2);
            assert_eq!(report.stats.files_scanned, 1);
            assert_eq!(report.stats.skipped_symlinks, 1);
            assert!(report.candidates.is_empty(), "workers={}", workers);
        }
    }
}
