//! Fetch sequencing with per-key request deduplication.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::key::QueryKey;
use super::store::CacheStore;
use crate::error::{ErrorInfo, ErrorKind, FetchError};

type SharedFetch<V> = Shared<BoxFuture<'static, CacheEntry<V>>>;

struct InFlight<V> {
  seq: u64,
  fetch: SharedFetch<V>,
}

struct Inner<V> {
  store: Arc<CacheStore<V>>,
  in_flight: Mutex<HashMap<QueryKey, InFlight<V>>>,
}

/// Runs fetches for query keys and records their outcome in a [`CacheStore`].
///
/// - At most one outbound request per key is in flight; concurrent callers
///   for the same key attach to it and observe the same resolved entry.
/// - A fresh successful entry is returned without calling the fetcher.
/// - The fetch runs on its own task, so a caller going away never leaves the
///   key pending.
/// - Failures are recorded as `Error` entries, never returned as `Err`.
pub struct QueryExecutor<V> {
  inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryExecutor<V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<V> QueryExecutor<V>
where
  V: Clone + Send + Sync + 'static,
{
  pub fn new(store: Arc<CacheStore<V>>) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        in_flight: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn store(&self) -> &Arc<CacheStore<V>> {
    &self.inner.store
  }

  /// Resolve `key`, calling `fetcher` only when there is neither a request in
  /// flight nor a fresh successful entry.
  pub async fn execute<F, Fut>(&self, key: &QueryKey, fetcher: F) -> CacheEntry<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
  {
    let fetch = {
      let mut in_flight = self.lock_in_flight();
      let store = &self.inner.store;

      let attached = in_flight
        .get(key)
        .filter(|pending| store.is_current(key, pending.seq))
        .map(|pending| pending.fetch.clone());

      if let Some(fetch) = attached {
        debug!(%key, "Attaching to in-flight request");
        fetch
      } else {
        if let Some(entry) = store.get(key).filter(|e| e.is_fresh(store.ttl())) {
          debug!(%key, "Cache hit");
          return entry;
        }
        let seq = store.issue_sequence();
        debug!(%key, seq, "Cache miss, issuing request");
        store.begin(key, seq);
        let fetch = self.spawn_fetch(key.clone(), seq, fetcher());
        in_flight.insert(
          key.clone(),
          InFlight {
            seq,
            fetch: fetch.clone(),
          },
        );
        fetch
      }
    };

    fetch.await
  }

  /// Invalidate matching keys; the next `execute` for any of them fetches.
  pub fn invalidate<P>(&self, predicate: P) -> Vec<QueryKey>
  where
    P: Fn(&QueryKey) -> bool,
  {
    // Lock order is in_flight then slots, same as `execute`
    let mut in_flight = self.lock_in_flight();
    let matched = self.inner.store.invalidate(&predicate);
    in_flight.retain(|key, _| !predicate(key));
    matched
  }

  fn spawn_fetch<Fut>(&self, key: QueryKey, seq: u64, fut: Fut) -> SharedFetch<V>
  where
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
  {
    let inner = Arc::clone(&self.inner);
    let task_key = key.clone();

    let handle = tokio::spawn(async move {
      let entry = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(data)) => CacheEntry::success(data),
        Ok(Err(e)) => {
          warn!(key = %task_key, error = %e, "Fetch failed");
          CacheEntry::error(ErrorInfo::from(e))
        }
        Err(_) => {
          warn!(key = %task_key, "Fetch panicked");
          CacheEntry::error(ErrorInfo::new(
            ErrorKind::NetworkError,
            "fetch task aborted: fetcher panicked",
          ))
        }
      };
      inner.store.apply(&task_key, seq, entry.clone());
      inner.finish(&task_key, seq);
      entry
    });

    let inner = Arc::clone(&self.inner);
    async move {
      match handle.await {
        Ok(entry) => entry,
        Err(e) => {
          // Cancelled with the runtime before recording anything
          let entry = CacheEntry::error(ErrorInfo::new(
            ErrorKind::NetworkError,
            format!("fetch task aborted: {}", e),
          ));
          inner.store.apply(&key, seq, entry.clone());
          inner.finish(&key, seq);
          entry
        }
      }
    }
    .boxed()
    .shared()
  }

  fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<QueryKey, InFlight<V>>> {
    self.inner.lock_in_flight()
  }
}

impl<V> Inner<V> {
  fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<QueryKey, InFlight<V>>> {
    self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Forget the in-flight request for `key` if it is still the one tagged `seq`.
  fn finish(&self, key: &QueryKey, seq: u64) {
    let mut in_flight = self.lock_in_flight();
    if in_flight.get(key).is_some_and(|f| f.seq == seq) {
      in_flight.remove(key);
    }
  }
}
