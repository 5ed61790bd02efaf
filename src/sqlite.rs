use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

use crate::store::{MemoryStore, Store};

const APP_DIR: &str = "bypass-router";
const STORE_FILE: &str = "store.db";
pub const MEMORY_STORE: &str = ":memory:";

pub fn get_default_store_path() -> Result<PathBuf> {
    let system = env::consts::OS;
    let home = env::var("HOME").or_else(|_| env::var("USERPROFILE"));

    let data_dir = match system {
        "windows" => PathBuf::from(env::var("LOCALAPPDATA")?),
        "macos" => PathBuf::from(home?).join("Library/Application Support"),
        _ => match env::var("XDG_DATA_HOME") {
            Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
            _ => PathBuf::from(home?).join(".local/share"),
        },
    };

    let path = data_dir.join(APP_DIR).join(STORE_FILE);
    info!(action = "resolve", component = "store_path", os = system, path = ?path, "Store path resolved");
    Ok(path)
}

/// Open the store named on the command line, or the default one.
pub fn open_store(path: Option<&Path>) -> Result<Rc<dyn Store>> {
    match path {
        Some(path) if path == Path::new(MEMORY_STORE) => {
            info!(action = "open", component = "store", "Using in-memory store");
            Ok(Rc::new(MemoryStore::new()))
        }
        Some(path) => Ok(Rc::new(SqliteStore::open(path)?)),
        None => Ok(Rc::new(SqliteStore::open(&get_default_store_path()?)?)),
    }
}

/// Key/value store backed by a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let start_time = Instant::now();
        info!(action = "start", component = "store_open", path = ?path, "Opening store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create store directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store at {:?}", path))?;
        let store = Self { conn };
        store.init_schema()?;

        info!(
            action = "complete",
            component = "store_open",
            duration_ms = start_time.elapsed().as_millis(),
            "Store opened"
        );
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .context("Failed to create kv table")?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read key {}", key))?;
        debug!(action = "get", component = "store", key, hit = value.is_some(), "Store read");
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key {}", key))?;
        debug!(action = "set", component = "store", key, bytes = value.len(), "Store write");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("Failed to remove key {}", key))?;
        debug!(action = "remove", component = "store", key, "Store delete");
        Ok(())
    }
}
