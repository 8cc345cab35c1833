pub mod attributes;
pub mod batch_mapper;
pub mod error;
pub mod materializer;
pub mod path_table;
pub mod record;
pub mod session;
pub mod vfs;

pub use batch_mapper::{BatchMapper, BatchReport, ItemFailure};
pub use error::ProjectionError;
pub use materializer::{EntryMaterializer, MaterializeOutcome};
pub use path_table::{MappedEntry, PathMappingTable, PendingEntry};
pub use record::{RecordKind, RemoteFileRecord};
pub use session::{ProjectionSession, SessionState};
