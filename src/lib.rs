//! Projects a cloud drive listing into an in-memory virtual filesystem.
//!
//! Folders become directories, regular files become empty placeholders and
//! shortcuts become symbolic links to their target's projected path. Each
//! node carries its remote id and kind as named attributes.

pub mod config;
pub mod drive_service;
pub mod log_appender;
pub mod projection;
