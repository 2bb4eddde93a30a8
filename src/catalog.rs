use serde::Serialize;

use crate::domain::{GroupCode, RecordId};

/// Record-to-group mapping accumulated over one sync run. Entries keep
/// discovery order; re-inserting a record overwrites its group in place
/// without reordering. Never persisted.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub record: RecordId,
    pub group: GroupCode,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: RecordId, group: GroupCode) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.record == record) {
            entry.group = group;
            return;
        }
        self.entries.push(CatalogEntry { record, group });
    }

    pub fn get(&self, record: &RecordId) -> Option<&GroupCode> {
        self.entries
            .iter()
            .find(|entry| entry.record == *record)
            .map(|entry| &entry.group)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}
