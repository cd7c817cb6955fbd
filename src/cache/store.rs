//! Session-scoped store of query results.

use chrono::Duration;
use color_eyre::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::key::QueryKey;
use super::storage::{CacheStorage, NoopStorage};

/// What `invalidate` does to matching entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationMode {
  /// Drop the entry; `get` returns `None` afterwards
  #[default]
  Remove,
  /// Keep the entry but flag it stale; `get` still returns it
  MarkStale,
}

struct Slot<V> {
  entry: Option<CacheEntry<V>>,
  /// Sequence number of the newest request allowed to write this slot
  last_seq: u64,
}

/// Key/value store of query results.
///
/// Exactly one entry exists per key. Every write replaces the whole entry
/// under a single lock, so readers never observe a half-written entry.
///
/// Writes coming from fetches carry an issue sequence number: a response is
/// only applied when its sequence number is not older than the last request
/// issued for that key, or than the last invalidation of that key.
pub struct CacheStore<V> {
  slots: Mutex<HashMap<QueryKey, Slot<V>>>,
  next_seq: AtomicU64,
  ttl: Option<Duration>,
  mode: InvalidationMode,
  storage: Box<dyn CacheStorage<V>>,
}

impl<V: Clone> CacheStore<V> {
  /// Create an in-memory store without TTL.
  pub fn new() -> Self {
    Self {
      slots: Mutex::new(HashMap::new()),
      next_seq: AtomicU64::new(1),
      ttl: None,
      mode: InvalidationMode::Remove,
      storage: Box::new(NoopStorage),
    }
  }

  /// Consider successful entries stale once older than `ttl`.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  pub fn with_invalidation_mode(mut self, mode: InvalidationMode) -> Self {
    self.mode = mode;
    self
  }

  /// Write successful entries through to `storage`.
  pub fn with_storage(mut self, storage: Box<dyn CacheStorage<V>>) -> Self {
    self.storage = storage;
    self
  }

  pub fn ttl(&self) -> Option<Duration> {
    self.ttl
  }

  /// Load persisted entries into memory. Keys already present are kept.
  pub fn hydrate(&self) -> Result<usize> {
    let persisted = self.storage.load_entries()?;
    let mut slots = self.lock();
    let mut loaded = 0;
    for (key, entry) in persisted {
      slots.entry(key).or_insert_with(|| {
        loaded += 1;
        Slot {
          entry: Some(entry),
          last_seq: 0,
        }
      });
    }
    debug!(loaded, "Hydrated cache from storage");
    Ok(loaded)
  }

  pub fn get(&self, key: &QueryKey) -> Option<CacheEntry<V>> {
    self.lock().get(key).and_then(|slot| slot.entry.clone())
  }

  /// Overwrite the entry for `key` unconditionally.
  ///
  /// Counts as the newest write: responses to requests issued before this
  /// call are discarded.
  pub fn set(&self, key: QueryKey, entry: CacheEntry<V>) {
    let seq = self.issue_sequence();
    self.persist(&key, &entry);
    let mut slots = self.lock();
    slots.insert(
      key,
      Slot {
        entry: Some(entry),
        last_seq: seq,
      },
    );
  }

  /// Remove (or mark stale, per the configured mode) all entries whose key
  /// matches `predicate`. Returns the matched keys.
  ///
  /// In-flight requests issued before this call can no longer write the
  /// matched keys. Pending entries are always removed so that nothing waits
  /// on a response that will be discarded.
  pub fn invalidate<P>(&self, predicate: P) -> Vec<QueryKey>
  where
    P: Fn(&QueryKey) -> bool,
  {
    let floor = self.next_seq.load(Ordering::SeqCst);
    let matched: Vec<QueryKey> = {
      let mut slots = self.lock();
      let mut matched = Vec::new();
      for (key, slot) in slots.iter_mut().filter(|(key, _)| predicate(key)) {
        slot.last_seq = slot.last_seq.max(floor);
        match (&mut slot.entry, self.mode) {
          (Some(entry), InvalidationMode::MarkStale) if !entry.is_pending() => entry.stale = true,
          (entry, _) => *entry = None,
        }
        matched.push(key.clone());
      }
      matched
    };

    if !matched.is_empty() {
      info!(count = matched.len(), mode = ?self.mode, "Invalidated cache entries");
      if let Err(e) = self.storage.remove_entries(&matched) {
        warn!(error = %e, "Failed to remove invalidated entries from storage");
      }
    }
    matched
  }

  /// Invalidate every entry.
  pub fn clear(&self) -> usize {
    self.invalidate(|_| true).len()
  }

  /// Allocate the next issue sequence number. Strictly increasing.
  pub fn issue_sequence(&self) -> u64 {
    self.next_seq.fetch_add(1, Ordering::SeqCst)
  }

  /// Whether a request tagged `seq` may still write `key`.
  pub fn is_current(&self, key: &QueryKey, seq: u64) -> bool {
    self
      .lock()
      .get(key)
      .map(|slot| seq >= slot.last_seq)
      .unwrap_or(true)
  }

  /// Mark `key` as pending for the request tagged `seq`, keeping the data of
  /// the previous successful fetch visible.
  pub fn begin(&self, key: &QueryKey, seq: u64) -> bool {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_insert(Slot {
      entry: None,
      last_seq: 0,
    });
    if seq < slot.last_seq {
      return false;
    }
    let previous = slot
      .entry
      .as_ref()
      .filter(|e| !e.stale)
      .and_then(|e| e.data.clone());
    slot.entry = Some(CacheEntry::pending(previous));
    slot.last_seq = seq;
    true
  }

  /// Apply the response of the request tagged `seq`.
  ///
  /// Returns `false` (and leaves the store untouched) when a newer request
  /// or an invalidation has superseded it.
  pub fn apply(&self, key: &QueryKey, seq: u64, entry: CacheEntry<V>) -> bool {
    {
      let mut slots = self.lock();
      let slot = slots.entry(key.clone()).or_insert(Slot {
        entry: None,
        last_seq: 0,
      });
      if seq < slot.last_seq {
        debug!(%key, seq, last_seq = slot.last_seq, "Discarding superseded response");
        return false;
      }
      slot.last_seq = seq;
      slot.entry = Some(entry.clone());
    }
    self.persist(key, &entry);
    true
  }

  /// Write `entry` through to storage. Anything but a success drops the
  /// persisted row so a later `hydrate` cannot resurrect an older result.
  fn persist(&self, key: &QueryKey, entry: &CacheEntry<V>) {
    let result = if entry.is_success() {
      self.storage.store_entry(key, entry)
    } else {
      self.storage.remove_entries(std::slice::from_ref(key))
    };
    if let Err(e) = result {
      warn!(%key, error = %e, "Failed to persist cache entry");
    }
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot<V>>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<V: Clone> Default for CacheStore<V> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::CacheStatus;

  fn list_key(skip: i64) -> QueryKey {
    QueryKey::new("products").with("skip", skip).with("limit", 8i64)
  }

  fn detail_key(id: &str) -> QueryKey {
    QueryKey::new("product").with("id", id)
  }

  #[test]
  fn test_read_after_write() {
    let store = CacheStore::new();
    assert!(store.get(&detail_key("1")).is_none());

    store.set(detail_key("1"), CacheEntry::success("phone"));
    let entry = store.get(&detail_key("1")).unwrap();
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(entry.data, Some("phone"));
  }

  #[test]
  fn test_set_overwrites() {
    let store = CacheStore::new();
    store.set(detail_key("1"), CacheEntry::success(1));
    store.set(detail_key("1"), CacheEntry::success(2));
    assert_eq!(store.get(&detail_key("1")).unwrap().data, Some(2));
  }

  #[test]
  fn test_invalidate_removes_matching_only() {
    let store = CacheStore::new();
    store.set(detail_key("7"), CacheEntry::success(7));
    store.set(list_key(0), CacheEntry::success(0));
    store.set(list_key(8), CacheEntry::success(8));

    let removed = store.invalidate(|k| k.resource() == "products");
    assert_eq!(removed.len(), 2);
    assert!(store.get(&list_key(0)).is_none());
    assert!(store.get(&list_key(8)).is_none());
    assert!(store.get(&detail_key("7")).is_some());
  }

  #[test]
  fn test_mark_stale_mode_keeps_entry() {
    let store = CacheStore::new().with_invalidation_mode(InvalidationMode::MarkStale);
    store.set(detail_key("7"), CacheEntry::success(7));

    store.invalidate(|k| *k == detail_key("7"));
    let entry = store.get(&detail_key("7")).unwrap();
    assert!(entry.stale);
    assert!(!entry.is_fresh(None));
  }

  #[test]
  fn test_newer_request_wins_over_slower_older_one() {
    let store = CacheStore::new();
    let key = list_key(0);

    let first = store.issue_sequence();
    assert!(store.begin(&key, first));
    let second = store.issue_sequence();
    assert!(store.begin(&key, second));

    assert!(store.apply(&key, second, CacheEntry::success("new")));
    // The slower first request completes afterwards and must not overwrite
    assert!(!store.apply(&key, first, CacheEntry::success("old")));
    assert_eq!(store.get(&key).unwrap().data, Some("new"));
  }

  #[test]
  fn test_invalidation_discards_in_flight_response() {
    let store = CacheStore::new();
    let key = detail_key("7");

    let seq = store.issue_sequence();
    store.begin(&key, seq);
    store.invalidate(|k| *k == key);
    assert!(store.get(&key).is_none());
    assert!(!store.is_current(&key, seq));

    assert!(!store.apply(&key, seq, CacheEntry::success("before mutation")));
    assert!(store.get(&key).is_none());

    let fresh = store.issue_sequence();
    assert!(store.is_current(&key, fresh));
    assert!(store.apply(&key, fresh, CacheEntry::success("after mutation")));
  }

  #[test]
  fn test_mark_stale_mode_drops_pending_entries() {
    let store: CacheStore<i32> =
      CacheStore::new().with_invalidation_mode(InvalidationMode::MarkStale);
    let key = detail_key("1");
    let seq = store.issue_sequence();
    store.begin(&key, seq);

    store.invalidate(|_| true);
    assert!(store.get(&key).is_none());
  }

  #[test]
  fn test_begin_keeps_previous_data() {
    let store = CacheStore::new();
    let key = list_key(0);
    store.set(key.clone(), CacheEntry::success(vec![1, 2]));

    let seq = store.issue_sequence();
    store.begin(&key, seq);
    let entry = store.get(&key).unwrap();
    assert!(entry.is_pending());
    assert_eq!(entry.data, Some(vec![1, 2]));
  }

  #[test]
  fn test_hydrate_from_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let first: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    first.set(detail_key("3"), CacheEntry::success(3));
    first.set(detail_key("4"), CacheEntry::error(crate::error::ErrorInfo::new(
      crate::error::ErrorKind::NetworkError,
      "down",
    )));

    let second: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    assert_eq!(second.hydrate().unwrap(), 1);
    assert_eq!(second.get(&detail_key("3")).unwrap().data, Some(3));
    assert!(second.get(&detail_key("4")).is_none());
  }

  #[test]
  fn test_invalidate_removes_persisted_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let first: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    first.set(detail_key("3"), CacheEntry::success(3));
    assert_eq!(first.clear(), 1);

    let second: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    assert_eq!(second.hydrate().unwrap(), 0);
  }

  #[test]
  fn test_failed_refetch_drops_persisted_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let first: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    first.set(detail_key("3"), CacheEntry::success(3));
    let seq = first.issue_sequence();
    assert!(first.begin(&detail_key("3"), seq));
    assert!(first.apply(
      &detail_key("3"),
      seq,
      CacheEntry::error(crate::error::ErrorInfo::new(
        crate::error::ErrorKind::Timeout,
        "slow",
      )),
    ));

    let second: CacheStore<u32> =
      CacheStore::<u32>::new().with_storage(Box::new(SqliteStorage::open_at(&path).unwrap()));
    assert_eq!(second.hydrate().unwrap(), 0);
    assert!(second.get(&detail_key("3")).is_none());
  }
}
