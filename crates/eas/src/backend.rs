//! ActiveSync backend facade
//!
//! Wires the client, provisioning manager and storage for one account, and
//! makes sure at most one operation runs against a folder at a time.

use anyhow::Result;
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::models::Message;
use crate::protocol::EasClient;
use crate::provisioning::ProvisionManager;
use crate::storage::BackendStorage;
use crate::sync::{CancelFlag, FolderLocks, MessageFetchCommand, SyncCommand, SyncListener, SyncStats};

/// Entry point for syncing and fetching one account's folders
///
/// Operations on different folders may run in parallel from different
/// threads. A second operation on a folder that is already busy fails with
/// [`crate::FolderBusyError`].
pub struct EasBackend {
    provision: Arc<ProvisionManager>,
    storage: Arc<dyn BackendStorage>,
    sync_command: SyncCommand,
    fetch_command: MessageFetchCommand,
    locks: FolderLocks,
}

impl EasBackend {
    pub fn new(
        client: Arc<dyn EasClient>,
        provision: Arc<ProvisionManager>,
        storage: Arc<dyn BackendStorage>,
    ) -> Self {
        Self {
            sync_command: SyncCommand::new(client.clone(), provision.clone(), storage.clone()),
            fetch_command: MessageFetchCommand::new(client, provision.clone(), storage.clone()),
            provision,
            storage,
            locks: FolderLocks::new(),
        }
    }

    /// Sync a folder into storage (see [`SyncCommand::sync`])
    pub fn sync(
        &self,
        folder_id: &str,
        config: &SyncConfig,
        listener: &dyn SyncListener,
    ) -> Result<SyncStats> {
        let _guard = self.locks.try_acquire(folder_id)?;
        self.sync_command.sync(folder_id, config, listener, None)
    }

    /// Like [`EasBackend::sync`], stopping between windows once `cancel` is raised
    pub fn sync_cancellable(
        &self,
        folder_id: &str,
        config: &SyncConfig,
        listener: &dyn SyncListener,
        cancel: &CancelFlag,
    ) -> Result<SyncStats> {
        let _guard = self.locks.try_acquire(folder_id)?;
        self.sync_command.sync(folder_id, config, listener, Some(cancel))
    }

    /// Fetch one message's full body; the caller decides whether to store it
    pub fn fetch_message(&self, folder_id: &str, server_id: &str) -> Result<Message> {
        let _guard = self.locks.try_acquire(folder_id)?;
        self.fetch_command.fetch(folder_id, server_id)
    }

    pub fn provision_manager(&self) -> &ProvisionManager {
        &self.provision
    }

    pub fn storage(&self) -> &dyn BackendStorage {
        self.storage.as_ref()
    }

    /// Whether an operation is currently running against `folder_id`
    pub fn is_busy(&self, folder_id: &str) -> bool {
        self.locks.is_active(folder_id)
    }
}
