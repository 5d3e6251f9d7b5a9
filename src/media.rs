use crate::app_dirs::AppDirs;
use crate::error::Result;
use clap::ValueEnum;
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The four kinds of user-supplied media the range keeps across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, strum_macros::Display)]
pub enum MediaSlot {
    #[value(name = "target_skin")]
    #[strum(serialize = "target_skin")]
    TargetSkin,
    #[value(name = "hit_sound")]
    #[strum(serialize = "hit_sound")]
    HitSound,
    #[value(name = "bg_music")]
    #[strum(serialize = "bg_music")]
    BackgroundMusic,
    #[value(name = "menu_bg")]
    #[strum(serialize = "menu_bg")]
    MenuBackground,
}

impl MediaSlot {
    /// Storage key for this slot.
    pub fn key(&self) -> &'static str {
        match self {
            MediaSlot::TargetSkin => "target_skin",
            MediaSlot::HitSound => "hit_sound",
            MediaSlot::BackgroundMusic => "bg_music",
            MediaSlot::MenuBackground => "menu_bg",
        }
    }
}

/// In-memory handle to a loaded media payload.
///
/// Valid only for the running process; settings never persist it.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub slot: MediaSlot,
    data: Arc<[u8]>,
}

impl MediaRef {
    pub fn new(slot: MediaSlot, data: Vec<u8>) -> Self {
        Self {
            slot,
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRef")
            .field("slot", &self.slot)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Key/value store for opaque binary payloads.
pub trait BlobStore {
    fn save_blob(&mut self, key: &str, data: &[u8]) -> Result<()>;
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Stored keys with their payload sizes, ordered by key.
    fn list(&self) -> Result<Vec<(String, usize)>>;
}

/// Blob store backed by an SQLite file.
#[derive(Debug)]
pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    /// Open the store at the default data location, creating it if needed.
    pub fn new() -> Result<Self> {
        Self::open(AppDirs::media_db_path())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn delete_blob(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM media WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl BlobStore for SqliteBlobStore {
    fn save_blob(&mut self, key: &str, data: &[u8]) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO media (key, data) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, data],
        )?;
        Ok(())
    }

    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self
            .conn
            .query_row("SELECT data FROM media WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(data)
    }

    fn list(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, length(data) FROM media ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let len: i64 = row.get(1)?;
            Ok((key, len.max(0) as usize))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

/// Process-local store used when no database can be opened, and in tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn save_blob(&mut self, key: &str, data: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<(String, usize)>> {
        Ok(self
            .blobs
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .sorted()
            .collect())
    }
}

/// Load a slot, treating every storage failure as absence.
pub fn restore_slot(store: &dyn BlobStore, slot: MediaSlot) -> Option<MediaRef> {
    match store.load_blob(slot.key()) {
        Ok(Some(data)) => {
            log::debug!("restored {} ({} bytes)", slot, data.len());
            Some(MediaRef::new(slot, data))
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("could not load {} from media store: {}", slot, e);
            None
        }
    }
}
