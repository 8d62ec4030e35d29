//! SQLite-based backend storage
//!
//! Folder extras and synced messages live in one database. Raw MIME bodies
//! are stored zstd-compressed.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::{BackendStorage, StoredMessage};
use crate::models::{EmailAddress, Flag, Message, MessageId};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Per-folder key/value extras (sync key lives here)
            CREATE TABLE folder_extras (
                folder_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (folder_id, key)
            );

            -- Synced messages with zstd-compressed raw MIME
            CREATE TABLE messages (
                folder_id TEXT NOT NULL,
                id TEXT NOT NULL,
                uid TEXT NOT NULL,
                flags TEXT NOT NULL DEFAULT '',
                subject TEXT,
                sender TEXT,
                sent_at TEXT,
                complete INTEGER NOT NULL DEFAULT 0,
                raw BLOB NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (folder_id, id)
            );
            "#,
        ),
    ])
}

/// Row shape read back from the messages table
type MessageRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    Vec<u8>,
    String,
);

/// SQLite-based backend storage
pub struct SqliteBackendStorage {
    conn: Mutex<Connection>,
}

impl SqliteBackendStorage {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn save(&self, message: Message, complete: bool) -> Result<()> {
        // Level 3 = good balance of speed vs compression
        let raw = zstd::encode_all(message.raw.as_slice(), 3).context("Failed to compress raw message")?;
        let flags = encode_flags(&message.flags);
        let sender = message.from.as_ref().map(EmailAddress::display);
        let sent_at = message.sent_at.map(|d| d.to_rfc3339());

        let conn = self.conn.lock().unwrap();

        // A partial copy never replaces a complete one
        conn.execute(
            "INSERT INTO messages
             (folder_id, id, uid, flags, subject, sender, sent_at, complete, raw, saved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(folder_id, id) DO UPDATE SET
                uid = excluded.uid,
                flags = excluded.flags,
                subject = excluded.subject,
                sender = excluded.sender,
                sent_at = excluded.sent_at,
                complete = excluded.complete,
                raw = excluded.raw,
                saved_at = excluded.saved_at
             WHERE excluded.complete = 1 OR messages.complete = 0",
            params![
                message.folder_id,
                message.id.as_str(),
                message.uid,
                flags,
                message.subject,
                sender,
                sent_at,
                complete,
                raw,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }
}

fn encode_flags(flags: &BTreeSet<Flag>) -> String {
    flags.iter().map(Flag::as_str).collect::<Vec<_>>().join(",")
}

fn decode_flags(s: &str) -> BTreeSet<Flag> {
    s.split(',').filter_map(Flag::parse).collect()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl BackendStorage for SqliteBackendStorage {
    fn get_folder_extra_string(&self, folder_id: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();

        let value = conn
            .query_row(
                "SELECT value FROM folder_extras WHERE folder_id = ? AND key = ?",
                [folder_id, key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_folder_extra_string(&self, folder_id: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO folder_extras (folder_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT(folder_id, key) DO UPDATE SET value = excluded.value",
            [folder_id, key, value],
        )?;

        Ok(())
    }

    fn save_partial_message(&self, message: Message) -> Result<()> {
        self.save(message, false)
    }

    fn save_complete_message(&self, message: Message) -> Result<()> {
        self.save(message, true)
    }

    fn get_message(&self, folder_id: &str, id: &MessageId) -> Result<Option<StoredMessage>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<MessageRow> = conn
            .query_row(
                "SELECT folder_id, id, uid, flags, subject, sender, sent_at, complete, raw, saved_at
                 FROM messages WHERE folder_id = ? AND id = ?",
                [folder_id, id.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                    ))
                },
            )
            .optional()?;

        let Some((folder_id, id, uid, flags, subject, sender, sent_at, complete, raw, saved_at)) =
            row
        else {
            return Ok(None);
        };

        let raw = zstd::decode_all(raw.as_slice()).context("Failed to decompress raw message")?;

        Ok(Some(StoredMessage {
            message: Message {
                id: MessageId::new(id),
                uid,
                folder_id,
                flags: decode_flags(&flags),
                subject,
                from: sender.as_deref().map(EmailAddress::parse),
                sent_at: sent_at.as_deref().and_then(parse_timestamp),
                raw,
            },
            complete,
            saved_at: parse_timestamp(&saved_at).unwrap_or_else(Utc::now),
        }))
    }

    fn count_messages(&self, folder_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE folder_id = ?",
            [folder_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const RAW: &[u8] = b"From: Jane Roe <jane@example.com>\r\nSubject: Hi\r\n\r\nHello there\r\n";

    fn create_test_store() -> (SqliteBackendStorage, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("eas.test.sqlite");
        let store = SqliteBackendStorage::new(&db_path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_folder_extras() {
        let (store, _dir) = create_test_store();

        assert_eq!(store.get_folder_extra_string("inbox", "EXTRA_SYNC_KEY").unwrap(), None);

        store.set_folder_extra_string("inbox", "EXTRA_SYNC_KEY", "1").unwrap();
        store.set_folder_extra_string("inbox", "EXTRA_SYNC_KEY", "2").unwrap();

        assert_eq!(
            store
                .get_folder_extra_string("inbox", "EXTRA_SYNC_KEY")
                .unwrap()
                .as_deref(),
            Some("2")
        );
        assert_eq!(store.get_folder_extra_string("sent", "EXTRA_SYNC_KEY").unwrap(), None);
    }

    #[test]
    fn test_message_round_trip() {
        let (store, _dir) = create_test_store();

        let mut message = Message::parse("inbox", "5:1", RAW);
        message.set_flag(Flag::Seen, true);
        message.set_flag(Flag::Flagged, true);
        store.save_complete_message(message.clone()).unwrap();

        let stored = store
            .get_message("inbox", &MessageId::new("5:1"))
            .unwrap()
            .unwrap();

        assert!(stored.complete);
        assert_eq!(stored.message.raw, RAW);
        assert_eq!(stored.message.flags, message.flags);
        assert_eq!(stored.message.subject.as_deref(), Some("Hi"));
        assert_eq!(stored.message.from, message.from);
    }

    #[test]
    fn test_partial_upgrade_and_no_downgrade() {
        let (store, _dir) = create_test_store();
        let id = MessageId::new("5:2");

        store.save_partial_message(Message::parse("inbox", "5:2", b"Subject: Hi\r\n")).unwrap();
        assert!(!store.get_message("inbox", &id).unwrap().unwrap().complete);

        store.save_complete_message(Message::parse("inbox", "5:2", RAW)).unwrap();
        let stored = store.get_message("inbox", &id).unwrap().unwrap();
        assert!(stored.complete);
        assert_eq!(stored.message.raw, RAW);

        store.save_partial_message(Message::parse("inbox", "5:2", b"Subject: Hi\r\n")).unwrap();
        let stored = store.get_message("inbox", &id).unwrap().unwrap();
        assert!(stored.complete);
        assert_eq!(stored.message.raw, RAW);
        assert_eq!(store.count_messages("inbox").unwrap(), 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("eas.test.sqlite");

        {
            let store = SqliteBackendStorage::new(&db_path).unwrap();
            store.set_folder_extra_string("inbox", "EXTRA_SYNC_KEY", "42").unwrap();
        }

        let store = SqliteBackendStorage::new(&db_path).unwrap();
        assert_eq!(
            store
                .get_folder_extra_string("inbox", "EXTRA_SYNC_KEY")
                .unwrap()
                .as_deref(),
            Some("42")
        );
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteBackendStorage::in_memory().unwrap();
        store.save_complete_message(Message::parse("inbox", "1", RAW)).unwrap();
        assert_eq!(store.count_messages("inbox").unwrap(), 1);
        assert_eq!(store.count_messages("sent").unwrap(), 0);
    }

    #[test]
    fn test_flag_encoding() {
        let flags: BTreeSet<Flag> = [Flag::Seen, Flag::Draft].into_iter().collect();
        assert_eq!(decode_flags(&encode_flags(&flags)), flags);
        assert!(decode_flags("").is_empty());
    }
}
