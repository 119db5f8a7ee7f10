//! Entry probing: metadata reads behind a small filesystem trait
//!
//! The walkers only ever need two operations, a stat and a directory
//! listing, so they go through [`FileSystem`]. [`LocalFs`] talks to the
//! real disk; [`super::MemoryFs`] serves synthetic trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Which timestamp is used for recency comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum TimeBasis {
    /// Last content modification
    #[default]
    #[value(name = "mtime")]
    Modified,
    /// Last access
    #[value(name = "atime")]
    Accessed,
    /// Last metadata change
    #[value(name = "ctime")]
    Changed,
}

impl TimeBasis {
    pub fn label(&self) -> &'static str {
        match self {
            TimeBasis::Modified => "mtime",
            TimeBasis::Accessed => "atime",
            TimeBasis::Changed => "ctime",
        }
    }
}

/// Type of filesystem entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Devices, sockets, fifos
    Other,
}

impl EntryKind {
    pub fn from_file_type(ft: fs::FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }

    pub fn is_dir(&self) -> bool {
        *self == EntryKind::Directory
    }
}

/// The three timestamps of an entry, in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntryTimes {
    pub modified: f64,
    pub accessed: f64,
    pub changed: f64,
}

impl EntryTimes {
    /// All three timestamps set to the same instant
    pub fn uniform(at: f64) -> Self {
        Self {
            modified: at,
            accessed: at,
            changed: at,
        }
    }

    pub fn get(&self, basis: TimeBasis) -> f64 {
        match basis {
            TimeBasis::Modified => self.modified,
            TimeBasis::Accessed => self.accessed,
            TimeBasis::Changed => self.changed,
        }
    }
}

/// Metadata of one entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    pub size: u64,
    pub device: u64,
    pub inode: u64,
    pub times: EntryTimes,
}

impl EntryMeta {
    /// Physical identity used by the symlink cycle guard
    ///
    /// `None` when the platform reports no inode numbers, in which case
    /// the entry can never be recognised as already visited.
    pub fn identity(&self) -> Option<(u64, u64)> {
        (self.inode != 0).then_some((self.device, self.inode))
    }
}

/// One name returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChild {
    pub path: PathBuf,
    /// Entry type without following symlinks
    pub kind: EntryKind,
}

/// A listing entry that could not be read
#[derive(Debug)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Result of listing one directory
pub type DirListing = Vec<Result<DirChild, EntryFailure>>;

/// The metadata operations a walk needs
///
/// `read_dir` returns the whole listing at once, so an implementation
/// holds at most one open directory handle per call and releases it
/// before returning.
pub trait FileSystem {
    fn metadata(&self, path: &Path, follow_symlinks: bool) -> io::Result<EntryMeta>;

    fn read_dir(&self, path: &Path) -> io::Result<DirListing>;
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn metadata(&self, path: &Path, follow_symlinks: bool) -> io::Result<EntryMeta> {
        (**self).metadata(path, follow_symlinks)
    }

    fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
        (**self).read_dir(path)
    }
}

/// The local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn metadata(&self, path: &Path, follow_symlinks: bool) -> io::Result<EntryMeta> {
        let md = if follow_symlinks {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };
        Ok(meta_from_std(&md))
    }

    fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
        let mut listing = Vec::new();
        for entry in fs::read_dir(path)? {
            let child = match entry {
                Ok(entry) => match entry.file_type() {
                    Ok(ft) => Ok(DirChild {
                        path: entry.path(),
                        kind: EntryKind::from_file_type(ft),
                    }),
                    Err(error) => Err(EntryFailure {
                        path: entry.path(),
                        error,
                    }),
                },
                Err(error) => Err(EntryFailure {
                    path: path.to_path_buf(),
                    error,
                }),
            };
            listing.push(child);
        }
        Ok(listing)
    }
}

#[cfg(unix)]
fn meta_from_std(md: &fs::Metadata) -> EntryMeta {
    use std::os::unix::fs::MetadataExt;

    let stamp = |secs: i64, nsec: i64| secs as f64 + nsec as f64 / 1e9;
    EntryMeta {
        kind: EntryKind::from_file_type(md.file_type()),
        size: md.size(),
        device: md.dev(),
        inode: md.ino(),
        times: EntryTimes {
            modified: stamp(md.mtime(), md.mtime_nsec()),
            accessed: stamp(md.atime(), md.atime_nsec()),
            changed: stamp(md.ctime(), md.ctime_nsec()),
        },
    }
}

#[cfg(not(unix))]
fn meta_from_std(md: &fs::Metadata) -> EntryMeta {
    use super::types::epoch_seconds;

    let stamp = |t: io::Result<std::time::SystemTime>| t.map(epoch_seconds).unwrap_or(0.0);
    EntryMeta {
        kind: EntryKind::from_file_type(md.file_type()),
        size: md.len(),
        device: 0,
        inode: 0,
        times: EntryTimes {
            modified: stamp(md.modified()),
            accessed: stamp(md.accessed()),
            changed: stamp(md.created()),
        },
    }
}

/// How a listed child should be treated by the walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildClass {
    /// Descend into it
    Directory { via_symlink: bool },
    /// Stat it as a file
    Leaf { is_symlink: bool },
}

/// Failure-tolerant metadata access for one walk
pub struct Prober<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    follow_symlinks: bool,
    time_basis: TimeBasis,
    now: f64,
}

impl<'a, F: FileSystem + ?Sized> Prober<'a, F> {
    pub fn new(fs: &'a F, follow_symlinks: bool, time_basis: TimeBasis, now: f64) -> Self {
        Self {
            fs,
            follow_symlinks,
            time_basis,
            now,
        }
    }

    /// The instant a failed entry contributes as its timestamp
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Stat honoring the symlink setting
    pub fn stat(&self, path: &Path) -> io::Result<EntryMeta> {
        self.fs.metadata(path, self.follow_symlinks)
    }

    /// Timestamp under the configured basis
    pub fn timestamp(&self, meta: &EntryMeta) -> f64 {
        meta.times.get(self.time_basis)
    }

    pub fn list(&self, path: &Path) -> io::Result<DirListing> {
        self.fs.read_dir(path)
    }

    /// Decide whether a listed child is a directory to descend into
    ///
    /// A symlink only counts as a directory when following is enabled and
    /// its target resolves to one; a dangling link falls through to the
    /// leaf path where its stat failure gets recorded.
    pub fn classify(&self, child: &DirChild) -> ChildClass {
        match child.kind {
            EntryKind::Directory => ChildClass::Directory { via_symlink: false },
            EntryKind::Symlink if !self.follow_symlinks => ChildClass::Leaf { is_symlink: true },
            EntryKind::Symlink => {
                let target_is_dir = self
                    .fs
                    .metadata(&child.path, true)
                    .map(|m| m.kind.is_dir())
                    .unwrap_or(false);
                if target_is_dir {
                    ChildClass::Directory { via_symlink: true }
                } else {
                    ChildClass::Leaf { is_symlink: true }
                }
            }
            EntryKind::File | EntryKind::Other => ChildClass::Leaf { is_symlink: false },
        }
    }
}
