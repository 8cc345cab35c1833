use serde::{Deserialize, Serialize};

/// Mime type the drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// Mime type the drive uses for shortcuts.
pub const SHORTCUT_MIME_TYPE: &str = "application/vnd.google-apps.shortcut";

/// Fields requested for every listed file. Keep in sync with `DriveFile`.
pub const LISTING_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, shortcutDetails/targetId, parents, createdTime, modifiedTime)";

/// ShortcutDetails: present on shortcut files only.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct ShortcutDetails {
    #[serde(rename = "targetId")]
    pub target_id: Option<String>,
    #[serde(rename = "targetMimeType")]
    pub target_mime_type: Option<String>,
}

/// DriveFile: one raw entry of a files listing.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "shortcutDetails")]
    pub shortcut_details: Option<ShortcutDetails>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(rename = "createdTime")]
    pub created_time: Option<String>,
    #[serde(rename = "modifiedTime")]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    pub fn is_shortcut(&self) -> bool {
        self.mime_type.as_deref() == Some(SHORTCUT_MIME_TYPE)
    }

    pub fn shortcut_target_id(&self) -> Option<&str> {
        self.shortcut_details
            .as_ref()
            .and_then(|d| d.target_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// FileList: one page of a files listing.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}
