//! Client-tier scan history cache with optimistic updates.
//!
//! The durable store and this cache are two independent copies of the same
//! logical collection. A completed scan lands here immediately for instant UI
//! feedback while the save call runs on its own; a failed save keeps the entry
//! and only flips its sync tag, so the user's scan is never discarded. The two
//! copies reconverge on the next full refetch.

use chrono::Utc;

use crate::models::scan::ScanHistoryItem;

/// Where an entry stands relative to the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Added optimistically, save not yet confirmed.
    LocalOnly,
    /// Confirmed durable.
    Persisted,
    /// Save failed; entry retained, surfaced as a warning.
    SaveFailed,
}

#[derive(Debug, Clone)]
pub struct CachedScan {
    pub item: ScanHistoryItem,
    pub sync: SyncState,
}

/// In-memory scan history, newest first.
#[derive(Debug, Default)]
pub struct HistoryCache {
    entries: Vec<CachedScan>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Millisecond-timestamp id, the scheme client-created scans use.
    pub fn generate_id() -> String {
        Utc::now().timestamp_millis().to_string()
    }

    /// Replace the whole cache from a store refetch. Everything fetched is by
    /// definition persisted.
    pub fn replace_all(&mut self, items: Vec<ScanHistoryItem>) {
        self.entries = items
            .into_iter()
            .map(|item| CachedScan {
                item,
                sync: SyncState::Persisted,
            })
            .collect();
    }

    /// Prepend a freshly completed scan before its save call resolves.
    pub fn add_optimistic(&mut self, item: ScanHistoryItem) {
        self.entries.insert(
            0,
            CachedScan {
                item,
                sync: SyncState::LocalOnly,
            },
        );
    }

    /// Mark an entry durable after a successful save. Returns false when the
    /// id is no longer cached (e.g. removed while the save was in flight).
    pub fn mark_persisted(&mut self, id: &str) -> bool {
        self.set_sync(id, SyncState::Persisted)
    }

    /// Record a failed save without dropping the entry.
    pub fn mark_save_failed(&mut self, id: &str) -> bool {
        self.set_sync(id, SyncState::SaveFailed)
    }

    fn set_sync(&mut self, id: &str, sync: SyncState) -> bool {
        match self.entries.iter_mut().find(|e| e.item.id == id) {
            Some(entry) => {
                entry.sync = sync;
                true
            }
            None => false,
        }
    }

    /// Remove an entry (user delete). Returns the removed item.
    pub fn remove(&mut self, id: &str) -> Option<ScanHistoryItem> {
        let idx = self.entries.iter().position(|e| e.item.id == id)?;
        Some(self.entries.remove(idx).item)
    }

    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.entries
            .iter()
            .find(|e| e.item.id == id)
            .map(|e| e.sync)
    }

    /// Snapshot of the items in display order, for the analytics functions.
    pub fn snapshot(&self) -> Vec<ScanHistoryItem> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedScan> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
