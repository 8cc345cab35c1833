//! Projection driver: places a batch of remote records into the virtual filesystem.
//!
//! A batch is split into folders and everything else. All folders are
//! materialized and awaited before the rest is submitted. Shortcuts in the
//! second phase only resolve against ids that were mapped when that phase
//! began; the others are parked in the pending table for `resolve_pending`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::projection::error::ProjectionError;
use crate::projection::materializer::{EntryMaterializer, MaterializeOutcome};
use crate::projection::path_table::{MappedEntry, PathMappingTable, PendingEntry};
use crate::projection::record::RemoteFileRecord;
use crate::projection::vfs::{VfsError, VfsOps, VfsResult};

/// One record with its resolved destination directory.
struct Job {
    record: RemoteFileRecord,
    parent: PathBuf,
    create_parents: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

impl ItemFailure {
    fn new(id: &str, reason: impl fmt::Display) -> Self {
        Self {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Per-item results of one `map_batch` or `resolve_pending` call.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub mapped: Vec<MappedEntry>,
    pub already_mapped: Vec<String>,
    pub conflicts: Vec<PathBuf>,
    /// Shortcuts still parked in the pending table.
    pub unresolved: Vec<String>,
    pub failed: Vec<ItemFailure>,
    /// Mapped, but the node refused part of its metadata.
    pub incomplete_metadata: Vec<String>,
}

impl BatchReport {
    /// Append `other`. Ids it mapped are no longer reported as unresolved.
    pub fn merge(&mut self, other: BatchReport) {
        self.unresolved
            .retain(|id| !other.mapped.iter().any(|e| &e.record.id == id));
        self.mapped.extend(other.mapped);
        self.already_mapped.extend(other.already_mapped);
        self.conflicts.extend(other.conflicts);
        self.unresolved.extend(other.unresolved);
        self.failed.extend(other.failed);
        self.incomplete_metadata.extend(other.incomplete_metadata);
    }

    pub fn mapped_ids(&self) -> Vec<&str> {
        self.mapped.iter().map(|e| e.record.id.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} mapped, {} already mapped, {} conflicts, {} pending, {} failed",
            self.mapped.len(),
            self.already_mapped.len(),
            self.conflicts.len(),
            self.unresolved.len(),
            self.failed.len()
        )
    }
}

/// Batch mapper for one projection session
pub struct BatchMapper {
    materializer: EntryMaterializer,
    table: Arc<PathMappingTable>,
    cancel: CancellationToken,
    limiter: Arc<Semaphore>,
}

impl BatchMapper {
    pub fn new(
        vfs: Arc<dyn VfsOps>,
        table: Arc<PathMappingTable>,
        cancel: CancellationToken,
        max_concurrent_items: usize,
    ) -> Self {
        Self {
            materializer: EntryMaterializer::new(vfs, table.clone()),
            table,
            cancel,
            limiter: Arc::new(Semaphore::new(max_concurrent_items.max(1))),
        }
    }

    pub fn table(&self) -> &Arc<PathMappingTable> {
        &self.table
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Materialize `records` under `parent`.
    ///
    /// With no `parent`, each record goes under the mapped path of its first
    /// mapped parent id. Records without one land at `/` in a root batch and
    /// fail otherwise.
    ///
    /// Per-item failures are logged and reported, never returned. Only
    /// cancellation ends the call with an error: a scope cancelled before or
    /// during the call stops submitting items and returns
    /// `ProjectionError::Cancelled`. Items already submitted still finish, so
    /// up to `max_concurrent_items` materializations may complete after the
    /// token fires. Nothing is rolled back.
    pub async fn map_batch(
        &self,
        records: Vec<RemoteFileRecord>,
        parent: Option<&Path>,
        is_root: bool,
        create_parents: bool,
    ) -> Result<BatchReport, ProjectionError> {
        self.ensure_not_cancelled()?;
        let (folders, others): (Vec<_>, Vec<_>) =
            records.into_iter().partition(RemoteFileRecord::is_folder);
        let scope = parent
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "/".to_string());
        info!(
            "🗂️ Mapping batch under {}: {} folders, {} other items",
            scope,
            folders.len(),
            others.len()
        );

        let mut report = BatchReport::default();

        let folder_jobs = self.plan(folders, parent, is_root, create_parents, &mut report);
        self.run_jobs(folder_jobs, &mut report, false).await?;

        self.ensure_not_cancelled()?;
        let other_jobs = self.plan(others, parent, is_root, create_parents, &mut report);
        let other_jobs = self.park_unresolved_shortcuts(other_jobs, &mut report);
        self.run_jobs(other_jobs, &mut report, false).await?;

        info!("✅ Batch under {} done: {}", scope, report.summary());
        Ok(report)
    }

    /// Retry pending shortcuts whose target has been mapped since they were parked.
    ///
    /// Repeats until a round maps nothing, so chains of shortcuts settle.
    /// On cancellation every shortcut not yet submitted goes back to pending.
    pub async fn resolve_pending(&self) -> Result<BatchReport, ProjectionError> {
        let mut report = BatchReport::default();
        loop {
            self.ensure_not_cancelled()?;
            let ready = self.table.take_resolvable_pending();
            if ready.is_empty() {
                break;
            }
            debug!("🔁 Retrying {} pending shortcuts", ready.len());

            let jobs = ready
                .into_iter()
                .map(|pending| Job {
                    record: pending.record,
                    parent: pending.parent_path,
                    create_parents: pending.create_parents,
                })
                .collect();
            let mapped_before = report.mapped.len();
            self.run_jobs(jobs, &mut report, true).await?;
            if report.mapped.len() == mapped_before {
                break;
            }
        }

        if !report.mapped.is_empty() {
            info!("🔗 Resolved {} pending shortcuts", report.mapped.len());
        }
        Ok(report)
    }

    fn plan(
        &self,
        records: Vec<RemoteFileRecord>,
        parent: Option<&Path>,
        is_root: bool,
        create_parents: bool,
        report: &mut BatchReport,
    ) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            match self.parent_for(&record, parent, is_root) {
                Ok(parent) => jobs.push(Job {
                    record,
                    parent,
                    create_parents,
                }),
                Err(e) => {
                    error!("❌ Cannot place {} ({}): {}", record.id, record.name, e);
                    report.failed.push(ItemFailure::new(&record.id, e));
                }
            }
        }
        jobs
    }

    fn parent_for(
        &self,
        record: &RemoteFileRecord,
        parent: Option<&Path>,
        is_root: bool,
    ) -> VfsResult<PathBuf> {
        if let Some(parent) = parent {
            return Ok(parent.to_path_buf());
        }
        if let Some(path) = record
            .parent_ids
            .iter()
            .find_map(|id| self.table.try_get_mapped_path(id))
        {
            return Ok(path);
        }
        if is_root {
            return Ok(PathBuf::from("/"));
        }
        Err(VfsError::not_found(format!("no mapped parent for {}", record.id)))
    }

    /// Split off shortcuts whose target is not mapped yet, judged before any
    /// job of the phase runs.
    fn park_unresolved_shortcuts(&self, jobs: Vec<Job>, report: &mut BatchReport) -> Vec<Job> {
        let (ready, parked): (Vec<Job>, Vec<Job>) =
            jobs.into_iter()
                .partition(|job| match job.record.shortcut_target_id() {
                    Some(target) => {
                        self.table.is_mapped(target) || self.table.is_mapped(&job.record.id)
                    }
                    None => true,
                });

        for job in parked {
            let target_id = job.record.shortcut_target_id().unwrap_or_default().to_string();
            self.absorb(report, job, MaterializeOutcome::Unresolved { target_id });
        }
        ready
    }

    fn ensure_not_cancelled(&self) -> Result<(), ProjectionError> {
        if self.cancel.is_cancelled() {
            warn!("🛑 Batch cancelled before submission");
            return Err(ProjectionError::Cancelled);
        }
        Ok(())
    }

    /// Run `jobs` and wait for every submitted one. With `requeue`, jobs left
    /// unsubmitted by cancellation are put back into the pending table.
    async fn run_jobs(
        &self,
        jobs: Vec<Job>,
        report: &mut BatchReport,
        requeue: bool,
    ) -> Result<(), ProjectionError> {
        let mut tasks = JoinSet::new();
        let mut unsubmitted = Vec::new();
        let mut cancelled = false;

        let mut queue = jobs.into_iter();
        while let Some(job) = queue.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = self.limiter.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancelled = true;
                unsubmitted.push(job);
                unsubmitted.extend(queue.by_ref());
                break;
            };

            let materializer = self.materializer.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    materializer.materialize(&job.record, Some(job.parent.as_path()), job.create_parents)
                }))
                .unwrap_or_else(|payload| {
                    MaterializeOutcome::Failed(VfsError::other(panic_message(payload.as_ref())))
                });
                (job, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((job, outcome)) => self.absorb(report, job, outcome),
                Err(e) => error!("❌ Materialization task did not complete: {}", e),
            }
        }

        if cancelled {
            warn!("🛑 Batch cancelled, {} items not submitted", unsubmitted.len());
            if requeue {
                for job in unsubmitted {
                    let id = job.record.id.clone();
                    self.table.record_pending(
                        &id,
                        PendingEntry::new(job.record, &job.parent, job.create_parents),
                    );
                }
            }
            return Err(ProjectionError::Cancelled);
        }
        Ok(())
    }

    fn absorb(&self, report: &mut BatchReport, job: Job, outcome: MaterializeOutcome) {
        let id = job.record.id.clone();
        match outcome {
            MaterializeOutcome::Mapped {
                entry,
                metadata_complete,
            } => {
                debug!("📁 Mapped {} -> {}", id, entry.virtual_path.display());
                if !metadata_complete {
                    warn!("⚠️ Incomplete metadata on {}", entry.virtual_path.display());
                    report.incomplete_metadata.push(id);
                }
                report.mapped.push(entry);
            }
            MaterializeOutcome::AlreadyMapped(path) => {
                debug!("Already mapped {} at {}", id, path.display());
                report.already_mapped.push(id);
            }
            MaterializeOutcome::Conflict(path) => {
                warn!(
                    "⚠️ Conflict: {} already exists, {} ({}) not mapped",
                    path.display(),
                    job.record.name,
                    id
                );
                report.conflicts.push(path);
            }
            MaterializeOutcome::Unresolved { target_id } => {
                debug!("⏳ Shortcut {} waits for target {}", id, target_id);
                self.table.record_pending(
                    &id,
                    PendingEntry::new(job.record, &job.parent, job.create_parents),
                );
                report.unresolved.push(id);
            }
            MaterializeOutcome::Failed(e) => {
                error!("❌ Failed to materialize {} ({}): {}", job.record.name, id, e);
                report.failed.push(ItemFailure::new(&id, e));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("materialization panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("materialization panicked: {}", msg)
    } else {
        "materialization panicked".to_string()
    }
}
