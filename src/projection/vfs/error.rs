//! Virtual filesystem error types.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a symbolic link: {0}")]
    NotASymlink(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Caller passed a blank attribute name, blank value or unusable leaf name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The node refuses the operation (e.g. attribute writes on a read-only view).
    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("too many symbolic links: {0}")]
    TooManySymlinks(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for the "path already occupied" condition the materializer reports as a conflict.
    pub fn is_already_exists(&self) -> bool {
        match self {
            VfsError::AlreadyExists(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::NotASymlink(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::TooManySymlinks(msg) => io::Error::other(format!("too many symbolic links: {msg}")),
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
