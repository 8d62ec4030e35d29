//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Message, MessageId};

/// A message as held by storage, with its completeness
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub message: Message,
    /// False when only a truncated prefix of the body has been stored
    pub complete: bool,
    pub saved_at: DateTime<Utc>,
}

/// Mailbox storage the sync engine writes into
///
/// Folder extras are a per-folder string key/value map; the engine keeps its
/// sync key there. Saving a message replaces any earlier copy with the same
/// folder and id, except that a partial save never downgrades a message
/// already stored complete.
pub trait BackendStorage: Send + Sync {
    /// Read a folder extra, None if it was never set
    fn get_folder_extra_string(&self, folder_id: &str, key: &str) -> Result<Option<String>>;

    /// Write a folder extra (upsert)
    fn set_folder_extra_string(&self, folder_id: &str, key: &str, value: &str) -> Result<()>;

    /// Store a message whose body is only a prefix of the real message
    fn save_partial_message(&self, message: Message) -> Result<()>;

    /// Store a message with its full body
    fn save_complete_message(&self, message: Message) -> Result<()>;

    /// Get a stored message
    fn get_message(&self, folder_id: &str, id: &MessageId) -> Result<Option<StoredMessage>>;

    /// Count messages stored for a folder
    fn count_messages(&self, folder_id: &str) -> Result<usize>;
}
