//! Eas crate - incremental Exchange ActiveSync mailbox sync
//!
//! This crate provides:
//! - Folder sync driven by server-issued sync keys, in windows of at most 30
//! - Single message fetch by server id
//! - A provisioning gate that re-provisions and retries a request once
//! - Storage trait abstractions with in-memory and SQLite implementations
//!
//! Wire encoding (WBXML over HTTP) is left to an [`EasClient`] implementation.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod provisioning;
pub mod storage;
pub mod sync;

pub use backend::EasBackend;
pub use config::SyncConfig;
pub use error::{
    FetchFailedError, FolderBusyError, MalformedResponseError, MessageNotFoundError,
    ProvisionRequiredError, SyncFailedError, is_provision_required,
};
pub use models::{EmailAddress, Flag, Message, MessageId};
pub use protocol::{EXTRA_SYNC_KEY, EasClient, INITIAL_SYNC_KEY, MAX_WINDOW_SIZE, STATUS_OK};
pub use provisioning::{ProvisionManager, ProvisionState, Provisioner};
pub use storage::{BackendStorage, InMemoryBackendStorage, SqliteBackendStorage, StoredMessage};
pub use sync::{
    CancelFlag, FolderLocks, MessageFetchCommand, NoopSyncListener, SyncCommand, SyncListener,
    SyncStats,
};
