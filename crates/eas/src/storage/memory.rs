//! In-memory storage implementation
//!
//! Used by tests and by embedders that keep their own persistence.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{BackendStorage, StoredMessage};
use crate::models::{Message, MessageId};

/// In-memory implementation of BackendStorage
///
/// HashMaps behind RwLocks, keyed by (folder_id, key) and (folder_id, message_id).
pub struct InMemoryBackendStorage {
    extras: RwLock<HashMap<(String, String), String>>,
    messages: RwLock<HashMap<(String, String), StoredMessage>>,
}

impl InMemoryBackendStorage {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            extras: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
        }
    }

    fn save(&self, message: Message, complete: bool) {
        let key = (message.folder_id.clone(), message.id.0.clone());
        let mut messages = self.messages.write().unwrap();

        if !complete && messages.get(&key).is_some_and(|m| m.complete) {
            return;
        }

        messages.insert(
            key,
            StoredMessage {
                message,
                complete,
                saved_at: Utc::now(),
            },
        );
    }
}

impl Default for InMemoryBackendStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendStorage for InMemoryBackendStorage {
    fn get_folder_extra_string(&self, folder_id: &str, key: &str) -> Result<Option<String>> {
        let extras = self.extras.read().unwrap();
        Ok(extras
            .get(&(folder_id.to_string(), key.to_string()))
            .cloned())
    }

    fn set_folder_extra_string(&self, folder_id: &str, key: &str, value: &str) -> Result<()> {
        let mut extras = self.extras.write().unwrap();
        extras.insert((folder_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn save_partial_message(&self, message: Message) -> Result<()> {
        self.save(message, false);
        Ok(())
    }

    fn save_complete_message(&self, message: Message) -> Result<()> {
        self.save(message, true);
        Ok(())
    }

    fn get_message(&self, folder_id: &str, id: &MessageId) -> Result<Option<StoredMessage>> {
        let messages = self.messages.read().unwrap();
        Ok(messages
            .get(&(folder_id.to_string(), id.0.clone()))
            .cloned())
    }

    fn count_messages(&self, folder_id: &str) -> Result<usize> {
        let messages = self.messages.read().unwrap();
        Ok(messages.keys().filter(|(folder, _)| folder == folder_id).count())
    }
}
