//! Single-threaded subtree walker
//!
//! Walks one directory tree with an explicit stack and computes the
//! aggregate (total file bytes, newest timestamp) of every directory
//! bottom-up.
//!
//! ```text
//! stack: [Enter(root)]
//!   pop Enter(dir)  -> stat dir, push Exit(dir), list children:
//!                        files      -> folded into dir's running total
//!                        subdirs    -> push Enter(subdir)
//!   pop Exit(dir)   -> every subdir of dir already finished:
//!                        filter dir, fold it into its parent
//! ```
//!
//! A directory is only evaluated against the filter once every directory
//! below it has been folded in, so candidates always carry complete
//! totals.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::probe::{ChildClass, FileSystem, Prober};
use super::types::{DirectoryAggregate, ErrorLog, ScanCounters, ScanReport, ScanStats};
use super::ScanOptions;

/// Physical directory identity: (device id, inode)
pub(crate) type DirIdentity = (u64, u64);

/// Directories already entered by a walk
///
/// A serial scan owns its set. The workers of a parallel scan share one,
/// so a directory reachable from two root children is entered only once.
#[derive(Debug)]
pub(crate) enum Visited<'s> {
    Own(HashSet<DirIdentity>),
    Shared(&'s Mutex<HashSet<DirIdentity>>),
}

impl Visited<'_> {
    /// Claim `identity`; false if some walk already entered it
    fn insert(&mut self, identity: DirIdentity) -> bool {
        match self {
            Visited::Own(set) => set.insert(identity),
            Visited::Shared(set) => set.lock().insert(identity),
        }
    }
}

/// Where a walk starts and what it inherits from an enclosing scan
#[derive(Debug)]
pub(crate) struct WalkStart<'s> {
    pub path: PathBuf,

    /// Device every descended directory must match (one-filesystem mode)
    pub root_device: Option<u64>,

    /// Directories to treat as already visited (symlink-following mode)
    pub visited: Visited<'s>,

    /// Whether failing to stat `path` ends the walk with an empty report
    pub fatal_root: bool,
}

impl<'s> WalkStart<'s> {
    /// A whole scan rooted at `path`
    pub fn scan_root(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            root_device: None,
            visited: Visited::Own(HashSet::new()),
            fatal_root: true,
        }
    }

    /// One child subtree of a scan whose root has already been read
    pub fn child(
        path: PathBuf,
        root_device: Option<u64>,
        visited: &'s Mutex<HashSet<DirIdentity>>,
    ) -> Self {
        Self {
            path,
            root_device,
            visited: Visited::Shared(visited),
            fatal_root: false,
        }
    }
}

/// Errors and counters accumulated during a walk
#[derive(Debug)]
pub(crate) struct Tally {
    pub errors: ErrorLog,
    pub stats: ScanStats,
}

impl Tally {
    pub fn new(error_limit: usize) -> Self {
        Self {
            errors: ErrorLog::new(error_limit),
            stats: ScanStats::default(),
        }
    }
}

/// Result of one walk, before it is frozen into a [`ScanReport`]
#[derive(Debug)]
pub(crate) struct SubtreeOutcome {
    pub candidates: Vec<DirectoryAggregate>,
    pub tally: Tally,
    pub root_summary: Option<DirectoryAggregate>,
}

impl SubtreeOutcome {
    pub fn into_report(self) -> ScanReport {
        let mut stats = self.tally.stats;
        stats.errors = self.tally.errors.total();
        ScanReport {
            candidates: self.candidates,
            errors: self.tally.errors.into_entries(),
            stats,
            root_summary: self.root_summary,
        }
    }
}

enum Frame {
    Enter { path: PathBuf, parent: Option<usize> },
    Exit { slot: usize },
}

/// A directory whose subdirectories are still being walked
struct Pending {
    path: PathBuf,
    parent: Option<usize>,
    size: u64,
    newest: f64,
}

/// Walks subtrees; holds no per-walk state, so one walker can serve many threads
pub(crate) struct SubtreeWalker<'a, F: FileSystem + ?Sized> {
    prober: Prober<'a, F>,
    options: &'a ScanOptions,
    counters: &'a ScanCounters,
}

impl<'a, F: FileSystem + ?Sized> SubtreeWalker<'a, F> {
    pub fn new(fs: &'a F, options: &'a ScanOptions, counters: &'a ScanCounters, now: f64) -> Self {
        Self {
            prober: Prober::new(fs, options.follow_symlinks, options.time_basis, now),
            options,
            counters,
        }
    }

    pub fn prober(&self) -> &Prober<'a, F> {
        &self.prober
    }

    pub fn counters(&self) -> &ScanCounters {
        self.counters
    }

    /// Walk the subtree described by `start`
    pub fn walk(&self, start: WalkStart<'_>) -> SubtreeOutcome {
        let WalkStart {
            path: root,
            mut root_device,
            mut visited,
            fatal_root,
        } = start;
        let mut tally = Tally::new(self.options.error_limit);

        if fatal_root {
            match self.prober.stat(&root) {
                Ok(meta) => {
                    if self.options.one_filesystem {
                        root_device = Some(meta.device);
                    }
                }
                Err(e) => {
                    error!(path = %root.display(), error = %e, "Cannot read scan root");
                    self.record_error(&mut tally, &root, &e);
                    return SubtreeOutcome {
                        candidates: Vec::new(),
                        tally,
                        root_summary: None,
                    };
                }
            }
        }

        let now = self.prober.now();
        let mut stack = vec![Frame::Enter {
            path: root,
            parent: None,
        }];
        let mut pending: HashMap<usize, Pending> = HashMap::new();
        let mut next_slot = 0usize;
        let mut candidates = Vec::new();
        let mut root_summary = None;

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter { path, parent } => {
                    let (newest, identity) = match self.prober.stat(&path) {
                        Ok(meta) => (self.prober.timestamp(&meta), meta.identity()),
                        Err(e) => {
                            self.record_error(&mut tally, &path, &e);
                            (now, None)
                        }
                    };

                    if self.prober.follows_symlinks() {
                        if let Some(identity) = identity {
                            if !visited.insert(identity) {
                                debug!(path = %path.display(), "Directory already visited, skipping");
                                tally.stats.skipped_symlinks += 1;
                                continue;
                            }
                        }
                    }

                    let slot = next_slot;
                    next_slot += 1;
                    tally.stats.dirs_scanned += 1;
                    self.counters.record_dir();
                    stack.push(Frame::Exit { slot });

                    let (size, newest) =
                        self.scan_listing(&path, newest, root_device, &mut tally, |child| {
                            stack.push(Frame::Enter {
                                path: child,
                                parent: Some(slot),
                            })
                        });

                    pending.insert(
                        slot,
                        Pending {
                            path,
                            parent,
                            size,
                            newest,
                        },
                    );
                }
                Frame::Exit { slot } => {
                    let Some(done) = pending.remove(&slot) else {
                        continue;
                    };
                    let aggregate = DirectoryAggregate::new(done.path, done.size, done.newest);

                    match done.parent {
                        Some(parent) => {
                            if let Some(parent) = pending.get_mut(&parent) {
                                parent.size += aggregate.size_bytes;
                                parent.newest = parent.newest.max(aggregate.newest_timestamp);
                            }
                        }
                        None => root_summary = Some(aggregate.clone()),
                    }

                    if aggregate.matches(self.options.min_size, self.options.cutoff) {
                        candidates.push(aggregate);
                    }
                }
            }
        }

        SubtreeOutcome {
            candidates,
            tally,
            root_summary,
        }
    }

    /// List one directory: fold its files in, hand subdirectories to `descend`
    ///
    /// Returns the directory's own file bytes and its running newest
    /// timestamp. Unreadable entries add nothing to the size and raise the
    /// timestamp to the scan's start instant.
    pub fn scan_listing(
        &self,
        path: &Path,
        mut newest: f64,
        root_device: Option<u64>,
        tally: &mut Tally,
        mut descend: impl FnMut(PathBuf),
    ) -> (u64, f64) {
        let now = self.prober.now();
        let follow = self.prober.follows_symlinks();

        let listing = match self.prober.list(path) {
            Ok(listing) => listing,
            Err(e) => {
                self.record_error(tally, path, &e);
                return (0, newest.max(now));
            }
        };

        let mut size = 0u64;
        for item in listing {
            let child = match item {
                Ok(child) => child,
                Err(failure) => {
                    self.record_error(tally, &failure.path, &failure.error);
                    newest = newest.max(now);
                    continue;
                }
            };

            match self.prober.classify(&child) {
                ChildClass::Directory { via_symlink } => {
                    if via_symlink && !follow {
                        tally.stats.skipped_symlinks += 1;
                        continue;
                    }
                    if let Some(root_device) = root_device {
                        match self.prober.stat(&child.path) {
                            Ok(meta) if meta.device != root_device => {
                                debug!(path = %child.path.display(), "Other filesystem, skipping");
                                tally.stats.skipped_other_fs += 1;
                                continue;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                self.record_error(tally, &child.path, &e);
                                newest = newest.max(now);
                                continue;
                            }
                        }
                    }
                    descend(child.path);
                }
                ChildClass::Leaf { is_symlink } => {
                    if is_symlink && !follow {
                        tally.stats.skipped_symlinks += 1;
                        continue;
                    }
                    match self.prober.stat(&child.path) {
                        Ok(meta) => {
                            tally.stats.files_scanned += 1;
                            self.counters.record_file(meta.size);
                            size += meta.size;
                            newest = newest.max(self.prober.timestamp(&meta));
                        }
                        Err(e) => {
                            self.record_error(tally, &child.path, &e);
                            newest = newest.max(now);
                        }
                    }
                }
            }
        }

        (size, newest)
    }

    pub fn record_error(&self, tally: &mut Tally, path: &Path, err: &io::Error) {
        // entries vanishing mid-scan are routine on live trees
        if err.kind() == io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %err, "Entry disappeared");
        } else {
            warn!(path = %path.display(), error = %err, "Cannot read entry");
        }
        tally.errors.record(path, err.to_string());
        self.counters.record_error();
    }
}
