//! Sync engine for fetching and storing mail
//!
//! Both entry points resume from the sync key persisted for the folder, so
//! a failed or cancelled operation can simply be run again.

mod fetch;
mod folder;
mod listener;
mod lock;

pub use fetch::MessageFetchCommand;
pub use folder::{CancelFlag, SyncCommand, SyncStats};
pub use listener::{NoopSyncListener, SyncListener};
pub use lock::{FolderGuard, FolderLocks};

use anyhow::{Context, Result};
use log::debug;

use crate::error::MalformedResponseError;
use crate::models::{Flag, Message};
use crate::protocol::api::{Sync, SyncCollection, SyncItem};
use crate::protocol::{EXTRA_SYNC_KEY, EasClient, check_provisioning};
use crate::storage::BackendStorage;

/// Read the folder's persisted sync key, or `default` if none was stored
fn read_sync_key(storage: &dyn BackendStorage, folder_id: &str, default: &str) -> Result<String> {
    let sync_key = storage
        .get_folder_extra_string(folder_id, EXTRA_SYNC_KEY)
        .with_context(|| format!("Failed to read sync key for folder {}", folder_id))?;
    Ok(sync_key.unwrap_or_else(|| default.to_string()))
}

/// Persist a sync key the server just accepted
fn write_sync_key(storage: &dyn BackendStorage, folder_id: &str, sync_key: &str) -> Result<()> {
    storage
        .set_folder_extra_string(folder_id, EXTRA_SYNC_KEY, sync_key)
        .with_context(|| format!("Failed to persist sync key for folder {}", folder_id))?;
    debug!("Folder {} sync key now {}", folder_id, sync_key);
    Ok(())
}

/// One round trip: send the request, surface provisioning faults as errors
fn exchange(client: &dyn EasClient, request: &Sync) -> Result<Sync> {
    let response = client.sync(request).context("Sync request failed")?;
    check_provisioning(&response)?;
    Ok(response)
}

fn collection<'a>(folder_id: &str, response: &'a Sync) -> Result<&'a SyncCollection> {
    response.collection().ok_or_else(|| {
        MalformedResponseError {
            folder: folder_id.to_string(),
            reason: "no collection in response",
        }
        .into()
    })
}

fn new_sync_key<'a>(folder_id: &str, collection: &'a SyncCollection) -> Result<&'a str> {
    collection.sync_key.as_deref().ok_or_else(|| {
        MalformedResponseError {
            folder: folder_id.to_string(),
            reason: "no sync key in response",
        }
        .into()
    })
}

/// Build a message from a sync item's body and read state
fn materialize(folder_id: &str, server_id: &str, item: &SyncItem) -> Message {
    let mut message = Message::parse(folder_id, server_id, item.body_bytes());
    if item.is_read() {
        message.set_flag(Flag::Seen, true);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::api::{SyncBody, SyncData};
    use crate::storage::InMemoryBackendStorage;

    #[test]
    fn test_read_sync_key_default() {
        let storage = InMemoryBackendStorage::new();
        assert_eq!(read_sync_key(&storage, "inbox", "0").unwrap(), "0");

        write_sync_key(&storage, "inbox", "17").unwrap();
        assert_eq!(read_sync_key(&storage, "inbox", "0").unwrap(), "17");
    }

    #[test]
    fn test_materialize_sets_seen() {
        let item = SyncItem {
            server_id: Some("5:1".into()),
            status: None,
            application_data: Some(SyncData {
                read: Some(1),
                body: Some(SyncBody {
                    data: Some("Subject: hi\r\n\r\nbody".into()),
                    ..Default::default()
                }),
            }),
        };

        let message = materialize("inbox", "5:1", &item);
        assert!(message.is_read());
        assert_eq!(message.id.as_str(), "5:1");
        assert_eq!(message.uid, "5:1");
        assert_eq!(message.subject.as_deref(), Some("hi"));
    }

    #[test]
    fn test_materialize_unread() {
        let item = SyncItem {
            server_id: Some("5:2".into()),
            ..Default::default()
        };
        assert!(!materialize("inbox", "5:2", &item).is_read());
    }

    #[test]
    fn test_missing_collection_is_malformed() {
        let err = collection("inbox", &Sync::default()).unwrap_err();
        assert!(err.downcast_ref::<MalformedResponseError>().is_some());
    }
}
