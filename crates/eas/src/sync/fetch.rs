//! Fetch one known message's full body

use anyhow::Result;
use log::{debug, info};
use std::sync::Arc;

use super::{exchange, materialize, new_sync_key, read_sync_key, write_sync_key};
use crate::error::{FetchFailedError, MessageNotFoundError};
use crate::models::Message;
use crate::protocol::api::Sync;
use crate::protocol::{EasClient, INITIAL_SYNC_KEY, STATUS_OK};
use crate::provisioning::ProvisionManager;
use crate::storage::BackendStorage;

/// Fetches a single message by server id
///
/// Unlike [`super::SyncCommand`], the fetched message is returned to the
/// caller and not written to storage. Only the sync key is persisted.
pub struct MessageFetchCommand {
    client: Arc<dyn EasClient>,
    provision: Arc<ProvisionManager>,
    storage: Arc<dyn BackendStorage>,
}

impl MessageFetchCommand {
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

    /// Fetch `server_id` from `folder_id` with its full, untruncated body
    ///
    /// # Errors
    /// - [`FetchFailedError`] if the server rejects the exchange; the sync
    ///   key is left untouched
    /// - [`MessageNotFoundError`] if the server accepted but returned no
    ///   OK result carrying `server_id`
    pub fn fetch(&self, folder_id: &str, server_id: &str) -> Result<Message> {
        let sync_key = read_sync_key(self.storage.as_ref(), folder_id, INITIAL_SYNC_KEY)?;
        let request = Sync::fetch(folder_id, &sync_key, server_id);

        debug!("Fetching message {} from folder {}", server_id, folder_id);
        let response = self
            .provision
            .ensure_provisioned(|| exchange(self.client.as_ref(), &request))?;

        let Some(collection) = response
            .collection()
            .filter(|c| c.status == Some(STATUS_OK))
        else {
            return Err(FetchFailedError {
                server_id: server_id.to_string(),
                status: response.collection().and_then(|c| c.status).or(response.status),
            }
            .into());
        };

        write_sync_key(self.storage.as_ref(), folder_id, new_sync_key(folder_id, collection)?)?;

        let item = collection
            .fetched()
            .iter()
            .find(|item| {
                item.server_id.as_deref().is_none_or(|id| id == server_id)
                    && item.status.is_none_or(|status| status == STATUS_OK)
            })
            .ok_or_else(|| MessageNotFoundError {
                server_id: server_id.to_string(),
            })?;

        info!("Fetched message {} from folder {}", server_id, folder_id);

        Ok(materialize(folder_id, server_id, item))
    }
}
