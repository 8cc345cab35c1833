//! Remote file records as the projection engine sees them.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::drive_service::drive_models::DriveFile;
use crate::projection::vfs::VfsError;

/// What a remote record projects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Folder,
    Regular,
    Shortcut { target_id: String },
}

impl RecordKind {
    /// Value persisted in the `remoteKind` node attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Folder => "folder",
            RecordKind::Regular => "file",
            RecordKind::Shortcut { .. } => "shortcut",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, RecordKind::Folder)
    }
}

/// Reasons a raw listing entry cannot become a record.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum RecordError {
    #[error("Listing entry has no id")]
    MissingId,

    #[error("Shortcut {0} has no target id")]
    MissingShortcutTarget(String),
}

/// One item from the remote listing. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFileRecord {
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
    pub parent_ids: Vec<String>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteFileRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            parent_ids: Vec::new(),
            mime_type: None,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, RecordKind::Folder)
    }

    pub fn regular(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, RecordKind::Regular)
    }

    pub fn shortcut(
        id: impl Into<String>,
        name: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            name,
            RecordKind::Shortcut {
                target_id: target_id.into(),
            },
        )
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_ids.push(parent_id.into());
        self
    }

    pub fn with_times(
        mut self,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.modified_at = modified_at;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    pub fn shortcut_target_id(&self) -> Option<&str> {
        match &self.kind {
            RecordKind::Shortcut { target_id } => Some(target_id),
            _ => None,
        }
    }

    /// Name usable as a single path component.
    ///
    /// Remote names may contain `/`; it is replaced with `_`.
    pub fn leaf_name(&self) -> Result<String, VfsError> {
        let name = self.name.replace('/', "_");
        match name.as_str() {
            "" | "." | ".." => Err(VfsError::invalid_argument(format!(
                "record {} has unusable name {:?}",
                self.id, self.name
            ))),
            _ => Ok(name),
        }
    }
}

/// Parse an RFC 3339 timestamp; anything unparseable is treated as absent.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl TryFrom<DriveFile> for RemoteFileRecord {
    type Error = RecordError;

    fn try_from(file: DriveFile) -> Result<Self, Self::Error> {
        if file.id.is_empty() {
            return Err(RecordError::MissingId);
        }

        let kind = if file.is_folder() {
            RecordKind::Folder
        } else if file.is_shortcut() {
            let target_id = file
                .shortcut_target_id()
                .ok_or_else(|| RecordError::MissingShortcutTarget(file.id.clone()))?;
            RecordKind::Shortcut {
                target_id: target_id.to_string(),
            }
        } else {
            RecordKind::Regular
        };

        Ok(Self {
            name: file.name.clone().unwrap_or_else(|| file.id.clone()),
            created_at: parse_timestamp(file.created_time.as_deref()),
            modified_at: parse_timestamp(file.modified_time.as_deref()),
            id: file.id,
            kind,
            parent_ids: file.parents,
            mime_type: file.mime_type,
        })
    }
}
