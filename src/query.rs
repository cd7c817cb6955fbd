//! What a consumer sees for one query: `{status, data, error}`.
//!
//! Modeled after TanStack Query's result object. A [`QueryResult`] is a typed
//! projection of a [`CacheEntry`], produced once the executor resolves.
//!
//! # Example
//!
//! ```ignore
//! let page = client.products(&PaginationState::default()).await;
//! match page.status {
//!     QueryStatus::Loading => render_spinner(),
//!     QueryStatus::Success => render_grid(page.data()),
//!     QueryStatus::Error => render_error(page.error()),
//!     QueryStatus::Idle => {}
//! }
//! ```

use crate::cache::{CacheEntry, CacheStatus};
use crate::error::{ErrorInfo, ErrorKind};

/// The state of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success,
  /// Query failed with an error
  Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
  pub status: QueryStatus,
  pub data: Option<T>,
  pub error: Option<ErrorInfo>,
}

impl<T> QueryResult<T> {
  pub fn idle() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
    }
  }

  /// Project a cache entry through `extract`.
  ///
  /// A successful entry whose payload is not of the expected variant becomes a
  /// `ParseError` instead of leaking mismatched data.
  pub fn from_entry<V, F>(entry: CacheEntry<V>, extract: F) -> Self
  where
    F: Fn(V) -> Option<T>,
  {
    match entry.status {
      CacheStatus::Pending => Self {
        status: QueryStatus::Loading,
        data: entry.data.and_then(&extract),
        error: None,
      },
      CacheStatus::Error => Self {
        status: QueryStatus::Error,
        data: None,
        error: entry.error,
      },
      CacheStatus::Success => match entry.data.and_then(&extract) {
        Some(data) => Self {
          status: QueryStatus::Success,
          data: Some(data),
          error: None,
        },
        None => Self {
          status: QueryStatus::Error,
          data: None,
          error: Some(ErrorInfo::new(
            ErrorKind::ParseError,
            "cached payload has an unexpected shape",
          )),
        },
      },
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    self.error.as_ref()
  }
}
