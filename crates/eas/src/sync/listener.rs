//! Sync progress notifications

use super::SyncStats;

/// Receives progress from folder syncs
///
/// Only `sync_new_message` is required. Calls arrive on the syncing thread.
pub trait SyncListener: Send + Sync {
    fn sync_started(&self, _folder_id: &str) {}

    /// A message was materialized and handed to storage
    ///
    /// `is_old_message` is always false from the sync engine; deduplication
    /// belongs to storage.
    fn sync_new_message(&self, folder_id: &str, server_id: &str, is_old_message: bool);

    fn sync_finished(&self, _folder_id: &str, _stats: &SyncStats) {}

    fn sync_failed(&self, _folder_id: &str, _message: &str) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSyncListener;

impl SyncListener for NoopSyncListener {
    fn sync_new_message(&self, _folder_id: &str, _server_id: &str, _is_old_message: bool) {}
}
