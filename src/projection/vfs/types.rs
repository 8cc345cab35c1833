//! Node types exposed by the virtual filesystem.

use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

impl NodeKind {
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, NodeKind::Symlink)
    }
}

/// Native attributes of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttr {
    pub kind: NodeKind,
    pub size: u64,
    pub perm: u32,
    pub created: SystemTime,
    pub modified: SystemTime,
}

impl NodeAttr {
    pub fn file(perm: u32) -> Self {
        Self::new(NodeKind::File, 0, perm)
    }

    pub fn directory(perm: u32) -> Self {
        Self::new(NodeKind::Directory, 0, perm)
    }

    /// Symlink size is the length of its target, as on a real filesystem.
    pub fn symlink(target_len: u64) -> Self {
        Self::new(NodeKind::Symlink, target_len, 0o777)
    }

    fn new(kind: NodeKind, size: u64, perm: u32) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            size,
            perm,
            created: now,
            modified: now,
        }
    }
}

/// Directory entry returned by `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
