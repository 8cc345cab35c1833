//! In-memory filesystem backing a projection session.
//!
//! Nodes live in a single ordered map keyed by normalized absolute path, so
//! a directory's descendants are contiguous and `read_dir` is a range scan.
//! All data is lost when the handle is dropped.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::ops::Bound;
use std::path::{Component, Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use super::error::{VfsError, VfsResult};
use super::ops::VfsOps;
use super::types::{DirEntry, NodeAttr, NodeKind};

const MAX_SYMLINK_HOPS: usize = 40;
const DIR_PERM: u32 = 0o755;
const FILE_PERM: u32 = 0o644;

#[derive(Debug, Clone)]
enum NodeData {
    File,
    Directory,
    Symlink { target: PathBuf },
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    attr: NodeAttr,
    xattrs: HashMap<String, Vec<u8>>,
}

impl Node {
    fn directory() -> Self {
        Self {
            data: NodeData::Directory,
            attr: NodeAttr::directory(DIR_PERM),
            xattrs: HashMap::new(),
        }
    }

    fn file() -> Self {
        Self {
            data: NodeData::File,
            attr: NodeAttr::file(FILE_PERM),
            xattrs: HashMap::new(),
        }
    }

    fn symlink(target: PathBuf) -> Self {
        let len = target.as_os_str().len() as u64;
        Self {
            data: NodeData::Symlink { target },
            attr: NodeAttr::symlink(len),
            xattrs: HashMap::new(),
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.data, NodeData::Directory)
    }
}

type NodeMap = BTreeMap<PathBuf, Node>;

/// In-memory, path-addressed filesystem. Thread-safe via an internal `RwLock`.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: RwLock<NodeMap>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::directory());
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    pub fn root(&self) -> &Path {
        Path::new("/")
    }

    /// Make `path` absolute and drop `.`/`..` lexically. `..` never escapes the root.
    pub fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::from("/");
        for component in path.components() {
            match component {
                Component::Normal(s) => result.push(s),
                Component::ParentDir => {
                    result.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        result
    }

    /// Number of nodes, the root included.
    pub fn node_count(&self) -> VfsResult<usize> {
        Ok(self.read()?.len())
    }

    /// Indented listing of the whole tree, one node per line.
    pub fn tree(&self) -> VfsResult<String> {
        let nodes = self.read()?;
        let mut out = String::from("/\n");
        for (path, node) in nodes.iter().filter(|(p, _)| p.as_path() != Path::new("/")) {
            let depth = path.components().count().saturating_sub(1);
            let indent = "  ".repeat(depth);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let line = match &node.data {
                NodeData::Directory => format!("{indent}{name}/\n"),
                NodeData::File => format!("{indent}{name}\n"),
                NodeData::Symlink { target } => {
                    format!("{indent}{name} -> {}\n", target.display())
                }
            };
            out.push_str(&line);
        }
        Ok(out)
    }

    fn read(&self) -> VfsResult<RwLockReadGuard<'_, NodeMap>> {
        self.nodes
            .read()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn write(&self) -> VfsResult<RwLockWriteGuard<'_, NodeMap>> {
        self.nodes
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn display(path: &Path) -> String {
        path.display().to_string()
    }

    fn check_parent(nodes: &NodeMap, path: &Path) -> VfsResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| VfsError::already_exists(Self::display(path)))?;
        match nodes.get(parent) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(VfsError::not_a_directory(Self::display(parent))),
            None => Err(VfsError::not_found(Self::display(parent))),
        }
    }

    fn insert_exclusive(&self, path: &Path, node: Node) -> VfsResult<()> {
        let path = Self::normalize(path);
        let mut nodes = self.write()?;
        if nodes.contains_key(&path) {
            return Err(VfsError::already_exists(Self::display(&path)));
        }
        Self::check_parent(&nodes, &path)?;
        nodes.insert(path, node);
        Ok(())
    }

    /// Walk `path` component by component, substituting symlink targets.
    fn resolve(nodes: &NodeMap, path: &Path) -> VfsResult<PathBuf> {
        let mut pending: Vec<OsString> = Self::normalize(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_os_string()),
                _ => None,
            })
            .rev()
            .collect();
        let mut current = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop() {
            if name == ".." {
                current.pop();
                continue;
            }
            let candidate = current.join(&name);
            match nodes.get(&candidate) {
                Some(Node {
                    data: NodeData::Symlink { target },
                    ..
                }) => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(VfsError::TooManySymlinks(Self::display(path)));
                    }
                    if target.has_root() {
                        current = PathBuf::from("/");
                    }
                    for component in target.components().rev() {
                        match component {
                            Component::Normal(s) => pending.push(s.to_os_string()),
                            Component::ParentDir => pending.push(OsString::from("..")),
                            _ => {}
                        }
                    }
                }
                Some(_) => current = candidate,
                None => return Err(VfsError::not_found(Self::display(&candidate))),
            }
        }
        Ok(current)
    }

    fn with_node_mut<T>(&self, path: &Path, f: impl FnOnce(&mut Node) -> T) -> VfsResult<T> {
        let path = Self::normalize(path);
        let mut nodes = self.write()?;
        nodes
            .get_mut(&path)
            .map(f)
            .ok_or_else(|| VfsError::not_found(Self::display(&path)))
    }
}

impl VfsOps for MemoryFs {
    fn metadata(&self, path: &Path) -> VfsResult<NodeAttr> {
        let nodes = self.read()?;
        let resolved = Self::resolve(&nodes, path)?;
        nodes
            .get(&resolved)
            .map(|n| n.attr.clone())
            .ok_or_else(|| VfsError::not_found(Self::display(&resolved)))
    }

    fn symlink_metadata(&self, path: &Path) -> VfsResult<NodeAttr> {
        let path = Self::normalize(path);
        let nodes = self.read()?;
        nodes
            .get(&path)
            .map(|n| n.attr.clone())
            .ok_or_else(|| VfsError::not_found(Self::display(&path)))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let nodes = self.read()?;
        let dir = Self::resolve(&nodes, path)?;
        match nodes.get(&dir) {
            Some(node) if node.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::display(&dir))),
            None => return Err(VfsError::not_found(Self::display(&dir))),
        }

        let entries = nodes
            .range::<PathBuf, _>((Bound::Excluded(dir.clone()), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(&dir))
            .filter(|(p, _)| p.parent() == Some(dir.as_path()))
            .filter_map(|(p, node)| {
                p.file_name()
                    .map(|n| DirEntry::new(n.to_string_lossy(), node.attr.kind))
            })
            .collect();
        Ok(entries)
    }

    fn create_dir(&self, path: &Path) -> VfsResult<()> {
        self.insert_exclusive(path, Node::directory())
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let path = Self::normalize(path);
        let mut nodes = self.write()?;
        let mut current = PathBuf::from("/");
        for component in path.components() {
            if let Component::Normal(s) = component {
                current.push(s);
                match nodes.get(&current) {
                    Some(node) if node.is_dir() => {}
                    Some(_) => return Err(VfsError::already_exists(Self::display(&current))),
                    None => {
                        nodes.insert(current.clone(), Node::directory());
                    }
                }
            }
        }
        Ok(())
    }

    fn create_file(&self, path: &Path) -> VfsResult<()> {
        self.insert_exclusive(path, Node::file())
    }

    fn symlink(&self, link: &Path, target: &Path) -> VfsResult<()> {
        self.insert_exclusive(link, Node::symlink(target.to_path_buf()))
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        let path = Self::normalize(path);
        let nodes = self.read()?;
        match nodes.get(&path) {
            Some(Node {
                data: NodeData::Symlink { target },
                ..
            }) => Ok(target.clone()),
            Some(_) => Err(VfsError::NotASymlink(Self::display(&path))),
            None => Err(VfsError::not_found(Self::display(&path))),
        }
    }

    fn canonicalize(&self, path: &Path) -> VfsResult<PathBuf> {
        let nodes = self.read()?;
        Self::resolve(&nodes, path)
    }

    fn set_xattr(&self, path: &Path, name: &str, value: &[u8]) -> VfsResult<()> {
        self.with_node_mut(path, |node| {
            node.xattrs.insert(name.to_string(), value.to_vec());
        })
    }

    fn get_xattr(&self, path: &Path, name: &str) -> VfsResult<Option<Vec<u8>>> {
        let path = Self::normalize(path);
        let nodes = self.read()?;
        nodes
            .get(&path)
            .map(|n| n.xattrs.get(name).cloned())
            .ok_or_else(|| VfsError::not_found(Self::display(&path)))
    }

    fn list_xattrs(&self, path: &Path) -> VfsResult<Vec<String>> {
        let path = Self::normalize(path);
        let nodes = self.read()?;
        let node = nodes
            .get(&path)
            .ok_or_else(|| VfsError::not_found(Self::display(&path)))?;
        let mut names: Vec<String> = node.xattrs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn set_times(
        &self,
        path: &Path,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
    ) -> VfsResult<()> {
        self.with_node_mut(path, |node| {
            if let Some(created) = created {
                node.attr.created = created;
            }
            if let Some(modified) = modified {
                node.attr.modified = modified;
            }
        })
    }
}
