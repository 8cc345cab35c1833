//! Creates the virtual node for a single remote record.

use crate::projection::attributes::MetadataCodec;
use crate::projection::path_table::{MappedEntry, PathMappingTable};
use crate::projection::record::{RecordKind, RemoteFileRecord};
use crate::projection::vfs::{VfsError, VfsOps, VfsResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What happened to one record.
#[derive(Debug)]
pub enum MaterializeOutcome {
    /// Node created and mapping recorded. `metadata_complete` is false when
    /// the node refused one of the metadata attributes.
    Mapped {
        entry: MappedEntry,
        metadata_complete: bool,
    },
    /// The id already had a mapping; nothing was created.
    AlreadyMapped(PathBuf),
    /// Something already occupies the target path.
    Conflict(PathBuf),
    /// Shortcut whose target id is not mapped yet.
    Unresolved { target_id: String },
    Failed(VfsError),
}

impl MaterializeOutcome {
    pub fn is_mapped(&self) -> bool {
        matches!(self, MaterializeOutcome::Mapped { .. })
    }
}

/// Entry materializer for the virtual filesystem
#[derive(Clone)]
pub struct EntryMaterializer {
    vfs: Arc<dyn VfsOps>,
    table: Arc<PathMappingTable>,
}

impl EntryMaterializer {
    pub fn new(vfs: Arc<dyn VfsOps>, table: Arc<PathMappingTable>) -> Self {
        Self { vfs, table }
    }

    pub fn vfs(&self) -> &Arc<dyn VfsOps> {
        &self.vfs
    }

    /// Where `record` lands under `parent` (the root when `None`).
    pub fn target_path(parent: Option<&Path>, record: &RemoteFileRecord) -> VfsResult<PathBuf> {
        let leaf = record.leaf_name()?;
        Ok(parent.unwrap_or_else(|| Path::new("/")).join(leaf))
    }

    /// Create the node for `record` under `parent`, write its metadata and
    /// record the mapping. Never panics on filesystem errors; every failure is
    /// returned as an outcome.
    pub fn materialize(
        &self,
        record: &RemoteFileRecord,
        parent: Option<&Path>,
        create_parents: bool,
    ) -> MaterializeOutcome {
        if let Some(existing) = self.table.try_get_mapped_path(&record.id) {
            return MaterializeOutcome::AlreadyMapped(existing);
        }

        let target = match Self::target_path(parent, record) {
            Ok(target) => target,
            Err(e) => return MaterializeOutcome::Failed(e),
        };

        let created = match &record.kind {
            RecordKind::Folder => self.create_folder(&target, create_parents),
            RecordKind::Regular => self.create_regular(&target, create_parents),
            RecordKind::Shortcut { target_id } => match self.table.try_get_mapped_path(target_id) {
                Some(link_target) => self.create_shortcut(&target, &link_target, create_parents),
                None => {
                    return MaterializeOutcome::Unresolved {
                        target_id: target_id.clone(),
                    }
                }
            },
        };
        if let Err(e) = created {
            return Self::classify(e, target);
        }

        let metadata_complete =
            match MetadataCodec::write_metadata(self.vfs.as_ref(), &target, record) {
                Ok(complete) => complete,
                Err(e) => return MaterializeOutcome::Failed(e),
            };

        if self.table.record_mapped(&record.id, record.clone(), &target) {
            MaterializeOutcome::Mapped {
                entry: MappedEntry {
                    record: record.clone(),
                    virtual_path: target,
                },
                metadata_complete,
            }
        } else {
            // Lost an insert race for the same id.
            MaterializeOutcome::AlreadyMapped(target)
        }
    }

    fn create_folder(&self, target: &Path, create_parents: bool) -> VfsResult<()> {
        if create_parents {
            self.ensure_parent(target)?;
        }
        self.vfs.create_dir(target)
    }

    fn create_regular(&self, target: &Path, create_parents: bool) -> VfsResult<()> {
        if create_parents {
            self.ensure_parent(target)?;
        }
        self.vfs.create_file(target)
    }

    fn create_shortcut(&self, target: &Path, link_target: &Path, create_parents: bool) -> VfsResult<()> {
        if create_parents {
            self.ensure_parent(target)?;
        }
        self.vfs.symlink(target, link_target)
    }

    fn ensure_parent(&self, target: &Path) -> VfsResult<()> {
        match target.parent() {
            Some(parent) => self.vfs.create_dir_all(parent),
            None => Ok(()),
        }
    }

    fn classify(error: VfsError, target: PathBuf) -> MaterializeOutcome {
        if error.is_already_exists() {
            MaterializeOutcome::Conflict(target)
        } else {
            MaterializeOutcome::Failed(error)
        }
    }
}
