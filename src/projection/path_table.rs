//! Session-scoped index from remote id to the virtual path it was projected to.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::projection::record::RemoteFileRecord;

/// A record that has a node in the virtual filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedEntry {
    pub record: RemoteFileRecord,
    pub virtual_path: PathBuf,
}

/// A record parked until its blocking dependency is mapped.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub record: RemoteFileRecord,
    /// Directory the record was going to be placed in.
    pub parent_path: PathBuf,
    pub create_parents: bool,
}

impl PendingEntry {
    pub fn new(record: RemoteFileRecord, parent_path: &Path, create_parents: bool) -> Self {
        Self {
            record,
            parent_path: parent_path.to_path_buf(),
            create_parents,
        }
    }
}

/// Mapped and pending records of one session.
///
/// Both maps only ever gain entries for an id that is absent; an existing
/// mapping is never overwritten. Safe for concurrent use.
#[derive(Debug, Default)]
pub struct PathMappingTable {
    mapped: DashMap<String, MappedEntry>,
    pending: DashMap<String, PendingEntry>,
}

impl PathMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_get_mapped_path(&self, id: &str) -> Option<PathBuf> {
        self.mapped.get(id).map(|e| e.virtual_path.clone())
    }

    pub fn is_mapped(&self, id: &str) -> bool {
        self.mapped.contains_key(id)
    }

    pub fn mapped_entry(&self, id: &str) -> Option<MappedEntry> {
        self.mapped.get(id).map(|e| e.value().clone())
    }

    /// Insert unless `id` is already mapped. Returns whether it inserted.
    ///
    /// A record that becomes mapped stops being pending.
    pub fn record_mapped(&self, id: &str, record: RemoteFileRecord, path: &Path) -> bool {
        let inserted = match self.mapped.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(MappedEntry {
                    record,
                    virtual_path: path.to_path_buf(),
                });
                true
            }
        };
        if inserted {
            self.pending.remove(id);
        }
        inserted
    }

    /// Remember a record that could not be placed yet. Returns whether it inserted.
    pub fn record_pending(&self, id: &str, entry: PendingEntry) -> bool {
        if self.mapped.contains_key(id) {
            return false;
        }
        match self.pending.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn remove_pending(&self, id: &str) -> Option<PendingEntry> {
        self.pending.remove(id).map(|(_, entry)| entry)
    }

    /// Remove and return pending shortcuts whose target is now mapped.
    pub fn take_resolvable_pending(&self) -> Vec<PendingEntry> {
        let ready: Vec<String> = self
            .pending
            .iter()
            .filter(|e| {
                e.value()
                    .record
                    .shortcut_target_id()
                    .is_some_and(|target| self.mapped.contains_key(target))
            })
            .map(|e| e.key().clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|id| self.remove_pending(&id))
            .collect()
    }

    pub fn mapped_len(&self) -> usize {
        self.mapped.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of all mapped entries, ordered by virtual path.
    pub fn mapped_entries(&self) -> Vec<MappedEntry> {
        let mut entries: Vec<MappedEntry> =
            self.mapped.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.virtual_path.cmp(&b.virtual_path));
        entries
    }

    /// Snapshot of pending records, ordered by id.
    pub fn pending_records(&self) -> Vec<RemoteFileRecord> {
        let mut records: Vec<RemoteFileRecord> =
            self.pending.iter().map(|e| e.value().record.clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}
