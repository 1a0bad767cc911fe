use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use tracing::warn;

use ragbox_core::ChatMessage;

use crate::migrations::MIGRATIONS;

/// The fixed storage key the whole message log lives under. The log is one
/// serialized list: overwritten after every change, read once at startup.
const MESSAGE_LOG_KEY: &str = "message_log";

pub struct MessageStore {
    conn: Mutex<Connection>,
}

impl MessageStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent dir for {}", path.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;

        for sql in MIGRATIONS {
            conn.execute(sql, [])
                .with_context(|| format!("failed migration sql: {sql}"))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        for sql in MIGRATIONS {
            conn.execute(sql, [])
                .with_context(|| format!("failed migration sql: {sql}"))?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Restores the message log. A missing key is an empty log; a value that
    /// no longer parses degrades to an empty log rather than failing the
    /// session start.
    pub fn load_messages(&self) -> Result<Vec<ChatMessage>> {
        match self.get_json::<Vec<ChatMessage>>(MESSAGE_LOG_KEY) {
            Ok(Some(messages)) => Ok(messages),
            Ok(None) => Ok(Vec::new()),
            Err(error) => {
                warn!(%error, "persisted message log unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Overwrites the entire serialized log. Called after every change.
    pub fn save_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        self.set_json(MESSAGE_LOG_KEY, &messages)
    }

    fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO session_state (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value_json FROM session_state WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let value_json: String = row.get(0)?;
        let value = serde_json::from_str(&value_json)?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbox_core::Engine;

    #[test]
    fn message_log_roundtrips_in_order() {
        let store = MessageStore::open_in_memory().expect("open store");
        assert!(store.load_messages().expect("load empty").is_empty());

        let log = vec![
            ChatMessage::user("What is the capital of France?"),
            ChatMessage::assistant(Engine::Enhanced, "Paris"),
            ChatMessage::user("and of Italy?"),
        ];
        store.save_messages(&log).expect("save log");

        let restored = store.load_messages().expect("reload log");
        assert_eq!(restored, log);
    }

    #[test]
    fn save_overwrites_previous_log() {
        let store = MessageStore::open_in_memory().expect("open store");
        store
            .save_messages(&[ChatMessage::user("first")])
            .expect("save first");

        let grown = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant(Engine::Pinecone, "second"),
        ];
        store.save_messages(&grown).expect("save grown");

        let restored = store.load_messages().expect("reload");
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[1].content, "second");
    }

    #[test]
    fn malformed_log_degrades_to_empty() {
        let store = MessageStore::open_in_memory().expect("open store");
        store
            .set_json(MESSAGE_LOG_KEY, &"not a message list")
            .expect("write junk");
        assert!(store.load_messages().expect("load").is_empty());
    }
}
