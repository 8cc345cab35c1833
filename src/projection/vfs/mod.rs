//! Virtual filesystem handle the projection writes into.

pub mod error;
pub mod memory;
pub mod ops;
pub mod types;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFs;
pub use ops::VfsOps;
pub use types::{DirEntry, NodeAttr, NodeKind};
