//! Cache entries and their status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

/// Status of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
  /// A request for this key is in flight
  Pending,
  /// Last request succeeded; `data` is set
  Success,
  /// Last request failed; `error` is set
  Error,
}

/// Stored outcome for one query key.
///
/// Entries are values: the store replaces them wholesale and never mutates
/// the status, data and error fields independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
  pub status: CacheStatus,
  /// For `Pending`, the data of the previous successful fetch, if any
  pub data: Option<V>,
  pub error: Option<ErrorInfo>,
  pub fetched_at: DateTime<Utc>,
  /// Set by invalidation when the store keeps invalidated entries around
  #[serde(default)]
  pub stale: bool,
}

impl<V> CacheEntry<V> {
  pub fn pending(previous: Option<V>) -> Self {
    Self {
      status: CacheStatus::Pending,
      data: previous,
      error: None,
      fetched_at: Utc::now(),
      stale: false,
    }
  }

  pub fn success(data: V) -> Self {
    Self {
      status: CacheStatus::Success,
      data: Some(data),
      error: None,
      fetched_at: Utc::now(),
      stale: false,
    }
  }

  pub fn error(error: ErrorInfo) -> Self {
    Self {
      status: CacheStatus::Error,
      data: None,
      error: Some(error),
      fetched_at: Utc::now(),
      stale: false,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.status == CacheStatus::Pending
  }

  pub fn is_success(&self) -> bool {
    self.status == CacheStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == CacheStatus::Error
  }

  /// Whether the entry is no longer authoritative.
  ///
  /// An entry is stale once invalidated, or when it is older than `ttl`.
  pub fn is_stale(&self, ttl: Option<Duration>) -> bool {
    if self.stale {
      return true;
    }
    match ttl {
      Some(ttl) => Utc::now() - self.fetched_at > ttl,
      None => false,
    }
  }

  /// A successful entry that can be served without refetching.
  pub fn is_fresh(&self, ttl: Option<Duration>) -> bool {
    self.is_success() && !self.is_stale(ttl)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn test_success_without_ttl_never_expires() {
    let mut entry = CacheEntry::success(1);
    entry.fetched_at = Utc::now() - Duration::days(365);
    assert!(entry.is_fresh(None));
  }

  #[test]
  fn test_ttl_expiry() {
    let mut entry = CacheEntry::success(1);
    entry.fetched_at = Utc::now() - Duration::minutes(10);
    assert!(entry.is_stale(Some(Duration::minutes(5))));
    assert!(!entry.is_stale(Some(Duration::minutes(15))));
  }

  #[test]
  fn test_error_and_pending_are_never_fresh() {
    let err: CacheEntry<i32> = CacheEntry::error(ErrorInfo::new(ErrorKind::ParseError, "bad"));
    assert!(!err.is_fresh(None));
    assert!(!CacheEntry::pending(Some(1)).is_fresh(None));
  }

  #[test]
  fn test_marked_stale() {
    let mut entry = CacheEntry::success("x");
    entry.stale = true;
    assert!(!entry.is_fresh(None));
  }
}
