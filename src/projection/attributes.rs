//! Remote metadata stored as named attributes on virtual nodes.

use crate::projection::record::RemoteFileRecord;
use crate::projection::vfs::{VfsError, VfsOps, VfsResult};
use log::{debug, warn};
use std::path::Path;
use std::time::SystemTime;

pub const REMOTE_ID_ATTR: &str = "user.remoteId";
pub const REMOTE_KIND_ATTR: &str = "user.remoteKind";

/// Remote metadata read back from a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub remote_id: String,
    pub remote_kind: String,
    pub created: SystemTime,
    pub modified: SystemTime,
}

/// Reads and writes the remote-origin attributes of a node
pub struct MetadataCodec;

impl MetadataCodec {
    /// Write `remoteId` and `remoteKind` on the node at `path` and apply the
    /// record's timestamps.
    ///
    /// Returns `Ok(false)` when the node refused one of the attribute writes.
    /// Whatever was written stays written. Blank names or values and any other
    /// filesystem failure are errors.
    pub fn write_metadata(
        vfs: &dyn VfsOps,
        path: &Path,
        record: &RemoteFileRecord,
    ) -> VfsResult<bool> {
        let id_written = Self::write_attribute(vfs, path, REMOTE_ID_ATTR, &record.id)?;
        let kind_written =
            Self::write_attribute(vfs, path, REMOTE_KIND_ATTR, record.kind.as_str())?;

        if record.created_at.is_some() || record.modified_at.is_some() {
            vfs.set_times(
                path,
                record.created_at.map(Into::into),
                record.modified_at.map(Into::into),
            )?;
        }

        Ok(id_written && kind_written)
    }

    /// Write one attribute. `Ok(false)` if the node does not accept attributes.
    pub fn write_attribute(
        vfs: &dyn VfsOps,
        path: &Path,
        name: &str,
        value: &str,
    ) -> VfsResult<bool> {
        if name.trim().is_empty() {
            return Err(VfsError::invalid_argument("attribute name must not be blank"));
        }
        if value.trim().is_empty() {
            return Err(VfsError::invalid_argument(format!(
                "value of {} must not be blank",
                name
            )));
        }

        match vfs.set_xattr(path, name, value.as_bytes()) {
            Ok(()) => Ok(true),
            Err(VfsError::Unsupported(msg)) => {
                warn!("⚠️ Attribute {} not written on {}: {}", name, path.display(), msg);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Stored remote id, or an empty string when there is none to read.
    pub fn read_remote_id(vfs: &dyn VfsOps, path: &Path) -> VfsResult<String> {
        Self::read_attribute(vfs, path, REMOTE_ID_ATTR)
    }

    pub fn read_remote_kind(vfs: &dyn VfsOps, path: &Path) -> VfsResult<String> {
        Self::read_attribute(vfs, path, REMOTE_KIND_ATTR)
    }

    /// Full remote metadata of a node, `None` if it was never projected.
    pub fn read_metadata(vfs: &dyn VfsOps, path: &Path) -> VfsResult<Option<NodeMetadata>> {
        let remote_id = Self::read_remote_id(vfs, path)?;
        if remote_id.is_empty() {
            return Ok(None);
        }
        let remote_kind = Self::read_remote_kind(vfs, path)?;
        let attr = vfs.symlink_metadata(path)?;
        Ok(Some(NodeMetadata {
            remote_id,
            remote_kind,
            created: attr.created,
            modified: attr.modified,
        }))
    }

    fn read_attribute(vfs: &dyn VfsOps, path: &Path, name: &str) -> VfsResult<String> {
        match vfs.get_xattr(path, name) {
            Ok(Some(bytes)) => Ok(String::from_utf8(bytes).unwrap_or_else(|_| {
                debug!("Attribute {} on {} is not UTF-8", name, path.display());
                String::new()
            })),
            Ok(None) | Err(VfsError::NotFound(_)) | Err(VfsError::Unsupported(_)) => {
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}
