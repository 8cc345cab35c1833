//! Path-addressed operations the projection engine needs from a virtual filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::types::{DirEntry, NodeAttr};
use super::VfsResult;

/// Virtual filesystem operations.
///
/// Calls are synchronous and may block; the batch mapper runs them on the
/// blocking pool. Implementations must tolerate concurrent creation under
/// different parent directories.
pub trait VfsOps: Send + Sync {
    /// Attributes of the node at `path`, following symbolic links.
    fn metadata(&self, path: &Path) -> VfsResult<NodeAttr>;

    /// Attributes of the node at `path` itself.
    fn symlink_metadata(&self, path: &Path) -> VfsResult<NodeAttr>;

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Create one directory. Fails if the path is occupied or the parent is missing.
    fn create_dir(&self, path: &Path) -> VfsResult<()>;

    /// Create a directory and any missing ancestors. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> VfsResult<()>;

    /// Create an empty file. Fails if the path is occupied or the parent is missing.
    fn create_file(&self, path: &Path) -> VfsResult<()>;

    /// Create a symbolic link at `link` pointing at `target`.
    fn symlink(&self, link: &Path, target: &Path) -> VfsResult<()>;

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Absolute path with every symbolic link resolved.
    fn canonicalize(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Set a named attribute on the node itself (symbolic links are not followed).
    fn set_xattr(&self, path: &Path, name: &str, value: &[u8]) -> VfsResult<()>;

    /// `Ok(None)` when the node exists but carries no such attribute.
    fn get_xattr(&self, path: &Path, name: &str) -> VfsResult<Option<Vec<u8>>>;

    fn list_xattrs(&self, path: &Path) -> VfsResult<Vec<String>>;

    /// Set creation and/or modification time on the node itself.
    fn set_times(
        &self,
        path: &Path,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
    ) -> VfsResult<()>;

    fn exists(&self, path: &Path) -> bool {
        self.symlink_metadata(path).is_ok()
    }
}
