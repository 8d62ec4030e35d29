//! Folder sync: pull pending deltas into storage in bounded windows

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{SyncListener, collection, exchange, materialize, new_sync_key, read_sync_key, write_sync_key};
use crate::config::SyncConfig;
use crate::error::{MalformedResponseError, SyncFailedError};
use crate::protocol::api::{Sync, SyncCollection};
use crate::protocol::{EasClient, INITIAL_SYNC_KEY, MAX_WINDOW_SIZE, STATUS_OK};
use crate::provisioning::ProvisionManager;
use crate::storage::BackendStorage;

/// Statistics from a folder sync
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncStats {
    /// Requests sent, including the handshake
    pub round_trips: usize,
    /// Whether this call had to establish sync state first
    pub handshake: bool,
    /// Messages materialized and handed to storage
    pub messages_synced: usize,
    /// Of those, stored as partial (truncated body)
    pub partial_messages: usize,
    /// Of those, stored complete
    pub complete_messages: usize,
    /// Server reported more deltas after the last window
    pub more_available: bool,
    /// Stopped early because the cancel flag was raised
    pub cancelled: bool,
    /// Duration of the sync operation
    pub duration_ms: u64,
}

/// Cooperative cancellation for a running sync
///
/// Checked between windows only, so the persisted sync key always matches
/// what has been stored.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pulls deltas for a folder and stores them
pub struct SyncCommand {
    client: Arc<dyn EasClient>,
    provision: Arc<ProvisionManager>,
    storage: Arc<dyn BackendStorage>,
}

impl SyncCommand {
    pub fn new(
        client: Arc<dyn EasClient>,
        provision: Arc<ProvisionManager>,
        storage: Arc<dyn BackendStorage>,
    ) -> Self {
        Self {
            client,
            provision,
            storage,
        }
    }

    /// Sync up to `config.default_visible_limit` messages of `folder_id`
    ///
    /// Starts from the persisted sync key (handshaking first if there is
    /// none), then requests windows of at most 30 items until the budget is
    /// reached or the server has nothing more. The sync key is persisted
    /// after each accepted window, before its messages are stored.
    ///
    /// On error, everything persisted so far is kept; the next call resumes
    /// from the last persisted sync key.
    pub fn sync(
        &self,
        folder_id: &str,
        config: &SyncConfig,
        listener: &dyn SyncListener,
        cancel: Option<&CancelFlag>,
    ) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        listener.sync_started(folder_id);

        match self.run(folder_id, config, listener, cancel, &mut stats) {
            Ok(()) => {
                stats.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Synced folder {}: {} messages in {} round trips",
                    folder_id, stats.messages_synced, stats.round_trips
                );
                listener.sync_finished(folder_id, &stats);
                Ok(stats)
            }
            Err(e) => {
                warn!("Sync of folder {} failed: {:#}", folder_id, e);
                listener.sync_failed(folder_id, &format!("{:#}", e));
                Err(e)
            }
        }
    }

    fn run(
        &self,
        folder_id: &str,
        config: &SyncConfig,
        listener: &dyn SyncListener,
        cancel: Option<&CancelFlag>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let budget = config.default_visible_limit;
        let mut sync_key = read_sync_key(self.storage.as_ref(), folder_id, INITIAL_SYNC_KEY)?;

        if sync_key == INITIAL_SYNC_KEY {
            debug!("No sync state for folder {}, handshaking", folder_id);
            let response = self.round_trip(&Sync::handshake(folder_id, &sync_key))?;
            stats.round_trips += 1;
            stats.handshake = true;

            let collection = accepted(folder_id, &response)?;
            sync_key = new_sync_key(folder_id, collection)?.to_string();
            write_sync_key(self.storage.as_ref(), folder_id, &sync_key)?;
        }

        while stats.messages_synced < budget {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                info!("Sync of folder {} cancelled", folder_id);
                stats.cancelled = true;
                break;
            }

            let window_size = (budget - stats.messages_synced).min(MAX_WINDOW_SIZE);
            let request = Sync::window(
                folder_id,
                &sync_key,
                window_size,
                config.maximum_auto_download_message_size,
            );

            let response = self.round_trip(&request)?;
            stats.round_trips += 1;

            let collection = accepted(folder_id, &response)?;
            sync_key = new_sync_key(folder_id, collection)?.to_string();
            write_sync_key(self.storage.as_ref(), folder_id, &sync_key)?;

            let added = collection.added();
            debug!(
                "Folder {}: window of {} requested, {} added",
                folder_id,
                window_size,
                added.len()
            );

            for item in added {
                let server_id = item.server_id.as_deref().ok_or(MalformedResponseError {
                    folder: folder_id.to_string(),
                    reason: "added item without server id",
                })?;
                let message = materialize(folder_id, server_id, item);

                if item.is_truncated() {
                    self.storage.save_partial_message(message)?;
                    stats.partial_messages += 1;
                } else {
                    self.storage.save_complete_message(message)?;
                    stats.complete_messages += 1;
                }

                listener.sync_new_message(folder_id, server_id, false);
            }

            stats.messages_synced += added.len();
            stats.more_available = collection.has_more();

            if !collection.has_more() {
                break;
            }

            if added.is_empty() {
                return Err(MalformedResponseError {
                    folder: folder_id.to_string(),
                    reason: "more available but window carried no items",
                }
                .into());
            }
        }

        Ok(())
    }

    fn round_trip(&self, request: &Sync) -> Result<Sync> {
        self.provision
            .ensure_provisioned(|| exchange(self.client.as_ref(), request))
    }
}

/// The response's collection, if the server accepted the exchange
fn accepted<'a>(folder_id: &str, response: &'a Sync) -> Result<&'a SyncCollection> {
    let collection = collection(folder_id, response)?;

    if collection.status != Some(STATUS_OK) {
        return Err(SyncFailedError {
            folder: folder_id.to_string(),
            status: collection.status.unwrap_or_default(),
        }
        .into());
    }

    Ok(collection)
}
