//! Errors that escape a batch or a session call.
//!
//! Per-item failures never show up here; they are outcomes in a `BatchReport`.

use std::path::PathBuf;
use thiserror::Error;

use crate::projection::session::SessionState;
use crate::projection::vfs::VfsError;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Remote listing failed: {0:#}")]
    Listing(anyhow::Error),

    #[error("Projection was cancelled")]
    Cancelled,

    #[error("Session is not ready (state: {0:?})")]
    NotReady(SessionState),

    #[error("Folder {0} is not mapped in this session")]
    UnknownFolder(String),

    #[error("No remote id stored at {0}")]
    NotProjected(PathBuf),

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl ProjectionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProjectionError::Cancelled)
    }
}
