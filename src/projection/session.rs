//! One projection session: owns the virtual filesystem, the mapping table and
//! the cancellation scope, and drives listing into mapping.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::ProjectionConfig;
use crate::drive_service::drive_client::{
    list_all_pages, DriveListingClient, ListingRequest, ListingScope,
};
use crate::projection::attributes::MetadataCodec;
use crate::projection::batch_mapper::{BatchMapper, BatchReport};
use crate::projection::error::ProjectionError;
use crate::projection::path_table::PathMappingTable;
use crate::projection::record::RemoteFileRecord;
use crate::projection::vfs::{MemoryFs, VfsOps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Initializing,
    Ready,
    Failed,
}

pub struct ProjectionSession {
    client: Arc<dyn DriveListingClient>,
    config: ProjectionConfig,
    vfs: Arc<MemoryFs>,
    table: Arc<PathMappingTable>,
    mapper: BatchMapper,
    cancel: CancellationToken,
    state: Mutex<SessionState>,
}

impl ProjectionSession {
    pub fn new(client: Arc<dyn DriveListingClient>, config: ProjectionConfig) -> Self {
        let vfs = Arc::new(MemoryFs::new());
        let table = Arc::new(PathMappingTable::new());
        let cancel = CancellationToken::new();
        let mapper = BatchMapper::new(
            vfs.clone(),
            table.clone(),
            cancel.clone(),
            config.max_concurrent_items,
        );

        Self {
            client,
            config,
            vfs,
            table,
            mapper,
            cancel,
            state: Mutex::new(SessionState::NotStarted),
        }
    }

    /// Project the root of the drive.
    ///
    /// On success the session is `Ready`. A listing failure or cancellation
    /// leaves it `Failed` and returns the error.
    pub async fn initialize(&self) -> Result<BatchReport, ProjectionError> {
        {
            let mut state = self.lock_state();
            if *state != SessionState::NotStarted {
                return Err(ProjectionError::NotReady(*state));
            }
            *state = SessionState::Initializing;
        }
        info!("🚀 Initializing projection session");

        let projected = self
            .project(ListingScope::Root, None, true)
            .await
            .and_then(|report| {
                if self.cancel.is_cancelled() {
                    Err(ProjectionError::Cancelled)
                } else {
                    Ok(report)
                }
            });
        match projected {
            Ok(report) => {
                self.set_state(SessionState::Ready);
                info!(
                    "✅ Projection ready: {} mapped, {} pending",
                    self.table.mapped_len(),
                    self.table.pending_len()
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(SessionState::Failed);
                error!("❌ Projection initialization failed: {}", e);
                Err(e)
            }
        }
    }

    /// List the children of a mapped folder and project them under its path.
    ///
    /// Failures are returned but never change the session state.
    pub async fn expand_folder(&self, folder_id: &str) -> Result<BatchReport, ProjectionError> {
        self.ensure_ready()?;

        let entry = self
            .table
            .mapped_entry(folder_id)
            .filter(|entry| entry.record.is_folder())
            .ok_or_else(|| ProjectionError::UnknownFolder(folder_id.to_string()))?;

        info!("📂 Expanding {} ({})", entry.virtual_path.display(), folder_id);
        let result = self
            .project(
                ListingScope::Parent(folder_id.to_string()),
                Some(entry.virtual_path.as_path()),
                false,
            )
            .await;
        if let Err(e) = &result {
            warn!("⚠️ Expanding {} failed: {}", folder_id, e);
        }
        result
    }

    /// Expand the folder projected at `path`. Symlinks are followed.
    pub async fn expand_path(&self, path: &Path) -> Result<BatchReport, ProjectionError> {
        self.ensure_ready()?;
        let resolved = self.vfs.canonicalize(path)?;
        match self.remote_id_at(&resolved)? {
            Some(id) => self.expand_folder(&id).await,
            None => Err(ProjectionError::NotProjected(path.to_path_buf())),
        }
    }

    /// Remote id stored on the node at `path`, without following symlinks.
    pub fn remote_id_at(&self, path: &Path) -> Result<Option<String>, ProjectionError> {
        let id = MetadataCodec::read_remote_id(&*self.vfs, path)?;
        Ok(Some(id).filter(|id| !id.is_empty()))
    }

    pub fn cancel(&self) {
        info!("🛑 Cancelling projection session");
        self.cancel.cancel();
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    pub fn vfs(&self) -> &Arc<MemoryFs> {
        &self.vfs
    }

    pub fn table(&self) -> &Arc<PathMappingTable> {
        &self.table
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn project(
        &self,
        scope: ListingScope,
        parent: Option<&Path>,
        is_root: bool,
    ) -> Result<BatchReport, ProjectionError> {
        let records = self.list(scope).await?;
        let mut report = self
            .mapper
            .map_batch(records, parent, is_root, self.config.create_parents)
            .await?;

        if self.config.resolve_pending && self.table.pending_len() > 0 {
            report.merge(self.mapper.resolve_pending().await?);
        }
        Ok(report)
    }

    async fn list(&self, scope: ListingScope) -> Result<Vec<RemoteFileRecord>, ProjectionError> {
        let request = ListingRequest::new(scope).with_page_size(self.config.page_size);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProjectionError::Cancelled),
            listed = list_all_pages(self.client.as_ref(), request, self.config.max_pages) => {
                listed.map_err(ProjectionError::Listing)
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), ProjectionError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            other => Err(ProjectionError::NotReady(other)),
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.lock_state() = next;
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
