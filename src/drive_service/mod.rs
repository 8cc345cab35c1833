//! Remote listing client for the cloud drive.

pub mod drive_client;
pub mod drive_models;
pub mod http_client;
