//! Persistence backends for successful cache entries.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::entry::CacheEntry;
use super::key::QueryKey;

/// Trait for cache persistence backends.
///
/// Only successful entries are handed to a backend. The in-memory store stays
/// authoritative; a backend is a write-through snapshot used to warm a new
/// process.
pub trait CacheStorage<V>: Send + Sync {
  /// Persist a successful entry, replacing any previous one for the key.
  fn store_entry(&self, key: &QueryKey, entry: &CacheEntry<V>) -> Result<()>;

  /// Load every persisted entry.
  fn load_entries(&self) -> Result<Vec<(QueryKey, CacheEntry<V>)>>;

  /// Delete the given keys.
  fn remove_entries(&self, keys: &[QueryKey]) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl<V> CacheStorage<V> for NoopStorage {
  fn store_entry(&self, _key: &QueryKey, _entry: &CacheEntry<V>) -> Result<()> {
    Ok(()) // Discard
  }

  fn load_entries(&self) -> Result<Vec<(QueryKey, CacheEntry<V>)>> {
    Ok(Vec::new())
  }

  fn remove_entries(&self, _keys: &[QueryKey]) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage<V> {
  conn: Mutex<Connection>,
  _marker: PhantomData<fn() -> V>,
}

impl<V> SqliteStorage<V> {
  /// Open (or create) the database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
      _marker: PhantomData,
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("catalog-query").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS query_cache (
    key_hash TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    query_key TEXT NOT NULL,
    data BLOB NOT NULL,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_query_cache_resource ON query_cache(resource);
"#;

impl<V> CacheStorage<V> for SqliteStorage<V>
where
  V: Serialize + DeserializeOwned,
{
  fn store_entry(&self, key: &QueryKey, entry: &CacheEntry<V>) -> Result<()> {
    let data = match &entry.data {
      Some(data) => serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize entry: {}", e))?,
      None => return Ok(()),
    };
    let query_key =
      serde_json::to_string(key).map_err(|e| eyre!("Failed to serialize query key: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO query_cache (key_hash, resource, query_key, data, fetched_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key.cache_hash(),
          key.resource(),
          query_key,
          data,
          entry.fetched_at.to_rfc3339()
        ],
      )
      .map_err(|e| eyre!("Failed to store entry {}: {}", key, e))?;

    Ok(())
  }

  fn load_entries(&self) -> Result<Vec<(QueryKey, CacheEntry<V>)>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT query_key, data, fetched_at FROM query_cache")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(String, Vec<u8>, String)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    // Rows that no longer decode (schema drift) are skipped, not fatal
    let entries = rows
      .into_iter()
      .filter_map(|(query_key, data, fetched_at)| {
        let key: QueryKey = serde_json::from_str(&query_key).ok()?;
        let data: V = serde_json::from_slice(&data).ok()?;
        let fetched_at = parse_datetime(&fetched_at).ok()?;
        let mut entry = CacheEntry::success(data);
        entry.fetched_at = fetched_at;
        Some((key, entry))
      })
      .collect();

    Ok(entries)
  }

  fn remove_entries(&self, keys: &[QueryKey]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    for key in keys {
      conn
        .execute(
          "DELETE FROM query_cache WHERE key_hash = ?",
          params![key.cache_hash()],
        )
        .map_err(|e| eyre!("Failed to remove entry {}: {}", key, e))?;
    }

    Ok(())
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
