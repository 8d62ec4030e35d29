//! Storage traits and implementations
//!
//! The sync engine only talks to [`BackendStorage`]. The in-memory and
//! SQLite implementations are interchangeable.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryBackendStorage;
pub use sqlite::SqliteBackendStorage;
pub use traits::{BackendStorage, StoredMessage};
