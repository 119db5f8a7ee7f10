//! In-memory filesystem
//!
//! A synthetic tree with explicit device ids, inodes, timestamps and
//! symlinks. Used to exercise the walkers on shapes that are awkward to
//! build on a real disk: mount points, symlink cycles, very deep chains and
//! entries that refuse to be read.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::probe::{DirChild, DirListing, EntryKind, EntryMeta, EntryTimes, FileSystem};

/// Symlink resolution gives up after this many hops (matches Linux ELOOP)
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum NodeData {
    Dir(Vec<OsString>),
    File,
    Symlink(PathBuf),
}

#[derive(Debug, Clone)]
struct MemNode {
    data: NodeData,
    size: u64,
    device: u64,
    inode: u64,
    times: EntryTimes,
    deny_stat: bool,
    deny_listing: bool,
}

impl MemNode {
    fn kind(&self) -> EntryKind {
        match self.data {
            NodeData::Dir(_) => EntryKind::Directory,
            NodeData::File => EntryKind::File,
            NodeData::Symlink(_) => EntryKind::Symlink,
        }
    }
}

/// Synthetic filesystem rooted at `/`, device 1
#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: HashMap<PathBuf, MemNode>,
    next_inode: u64,
    default_time: f64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::with_default_time(0.0)
    }

    /// Implicitly created parent directories get `time` as their timestamps
    pub fn with_default_time(time: f64) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            PathBuf::from("/"),
            MemNode {
                data: NodeData::Dir(Vec::new()),
                size: 0,
                device: 1,
                inode: 1,
                times: EntryTimes::uniform(time),
                deny_stat: false,
                deny_listing: false,
            },
        );
        Self {
            nodes,
            next_inode: 2,
            default_time: time,
        }
    }

    /// Add a directory (or retime an existing one)
    pub fn add_dir(&mut self, path: impl AsRef<Path>, time: f64) -> &mut Self {
        let path = path.as_ref();
        if let Some(node) = self.nodes.get_mut(path) {
            node.times = EntryTimes::uniform(time);
            return self;
        }
        let device = self.ensure_parent(path);
        self.insert(path, NodeData::Dir(Vec::new()), 0, device, time);
        self
    }

    /// Add a directory that lives on another device
    pub fn add_mount(&mut self, path: impl AsRef<Path>, device: u64, time: f64) -> &mut Self {
        let path = path.as_ref();
        self.add_dir(path, time);
        if let Some(node) = self.nodes.get_mut(path) {
            node.device = device;
        }
        self
    }

    /// Add a regular file
    pub fn add_file(&mut self, path: impl AsRef<Path>, size: u64, time: f64) -> &mut Self {
        let path = path.as_ref();
        let device = self.ensure_parent(path);
        self.insert(path, NodeData::File, size, device, time);
        self
    }

    /// Add a symlink; relative targets resolve against the link's directory
    pub fn add_symlink(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        let device = self.ensure_parent(path);
        let time = self.default_time;
        self.insert(
            path,
            NodeData::Symlink(target.as_ref().to_path_buf()),
            0,
            device,
            time,
        );
        self
    }

    /// Set all three timestamps independently
    pub fn set_times(&mut self, path: impl AsRef<Path>, times: EntryTimes) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(path.as_ref()) {
            node.times = times;
        }
        self
    }

    /// Make stat on `path` fail with permission denied
    pub fn deny_stat(&mut self, path: impl AsRef<Path>) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(path.as_ref()) {
            node.deny_stat = true;
        }
        self
    }

    /// Make listing `path` fail with permission denied
    pub fn deny_listing(&mut self, path: impl AsRef<Path>) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(path.as_ref()) {
            node.deny_listing = true;
        }
        self
    }

    /// Create missing ancestors of `path`, returning the parent's device
    fn ensure_parent(&mut self, path: &Path) -> u64 {
        let Some(parent) = path.parent() else {
            return 1;
        };

        let mut missing = Vec::new();
        let mut cursor = Some(parent);
        while let Some(dir) = cursor {
            if self.nodes.contains_key(dir) {
                break;
            }
            missing.push(dir.to_path_buf());
            cursor = dir.parent();
        }

        for dir in missing.into_iter().rev() {
            let device = dir
                .parent()
                .and_then(|p| self.nodes.get(p))
                .map(|n| n.device)
                .unwrap_or(1);
            let time = self.default_time;
            self.insert(&dir, NodeData::Dir(Vec::new()), 0, device, time);
        }

        self.nodes.get(parent).map(|n| n.device).unwrap_or(1)
    }

    fn insert(&mut self, path: &Path, data: NodeData, size: u64, device: u64, time: f64) {
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MemNode {
                data: NodeData::Dir(children),
                ..
            }) = self.nodes.get_mut(parent)
            {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_os_string());
                }
            }
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.nodes.insert(
            path.to_path_buf(),
            MemNode {
                data,
                size,
                device,
                inode,
                times: EntryTimes::uniform(time),
                deny_stat: false,
                deny_listing: false,
            },
        );
    }

    /// Map `path` to the key of the node it names
    ///
    /// Stored keys never contain symlink components, so a direct hit is
    /// already canonical; only misses pay for a component-wise walk.
    fn resolve(&self, path: &Path, follow_last: bool, hops: &mut usize) -> io::Result<PathBuf> {
        let mut current = path.to_path_buf();
        loop {
            if !self.nodes.contains_key(&current) {
                current = self.resolve_components(&current, hops)?;
            }
            match self.nodes.get(&current).map(|n| &n.data) {
                Some(NodeData::Symlink(target)) if follow_last => {
                    *hops += 1;
                    if *hops > MAX_SYMLINK_HOPS {
                        return Err(too_many_links(path));
                    }
                    current = link_target(&current, target);
                }
                Some(_) => return Ok(current),
                None => return Err(not_found(path)),
            }
        }
    }

    fn resolve_components(&self, path: &Path, hops: &mut usize) -> io::Result<PathBuf> {
        let components: Vec<Component> = path.components().collect();
        let mut resolved = PathBuf::from("/");

        for (i, component) in components.iter().enumerate() {
            match component {
                Component::RootDir | Component::Prefix(_) => resolved = PathBuf::from("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(name) => {
                    let candidate = resolved.join(name);
                    let is_last = i + 1 == components.len();
                    match self.nodes.get(&candidate).map(|n| &n.data) {
                        Some(NodeData::Symlink(target)) if !is_last => {
                            *hops += 1;
                            if *hops > MAX_SYMLINK_HOPS {
                                return Err(too_many_links(path));
                            }
                            let target = link_target(&candidate, target);
                            resolved = self.resolve(&target, true, hops)?;
                        }
                        Some(_) => resolved = candidate,
                        None => return Err(not_found(path)),
                    }
                }
            }
        }
        Ok(resolved)
    }
}

impl FileSystem for MemoryFs {
    fn metadata(&self, path: &Path, follow_symlinks: bool) -> io::Result<EntryMeta> {
        let mut hops = 0;
        let key = self.resolve(path, follow_symlinks, &mut hops)?;
        let node = self.nodes.get(&key).ok_or_else(|| not_found(path))?;
        if node.deny_stat {
            return Err(denied(path));
        }
        Ok(EntryMeta {
            kind: node.kind(),
            size: node.size,
            device: node.device,
            inode: node.inode,
            times: node.times,
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
        let mut hops = 0;
        let key = self.resolve(path, true, &mut hops)?;
        let node = self.nodes.get(&key).ok_or_else(|| not_found(path))?;
        if node.deny_listing {
            return Err(denied(path));
        }
        let NodeData::Dir(children) = &node.data else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("Not a directory: '{}'", path.display()),
            ));
        };

        let listing = children
            .iter()
            .map(|name| {
                let kind = self
                    .nodes
                    .get(&key.join(name))
                    .map(MemNode::kind)
                    .unwrap_or(EntryKind::Other);
                Ok(DirChild {
                    path: path.join(name),
                    kind,
                })
            })
            .collect();
        Ok(listing)
    }
}

fn link_target(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        link.parent().unwrap_or(Path::new("/")).join(target)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("No such file or directory: '{}'", path.display()),
    )
}

fn denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("Permission denied: '{}'", path.display()),
    )
}

fn too_many_links(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("Too many levels of symbolic links: '{}'", path.display()),
    )
}
