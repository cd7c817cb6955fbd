//! Pagination state and the controller that loads product pages.
//!
//! [`PaginationState`] is a plain value derived from the navigation
//! parameters (`skip`, `limit`). Navigation never mutates it: `move_by`
//! returns a new state, and `encode` produces the parameters a navigation
//! write would carry, which `parse` reads back unchanged.

use tokio::sync::watch;
use tracing::debug;
use url::form_urlencoded;

use crate::catalog::{CachedCatalogClient, ProductListResult};
use crate::error::{ErrorInfo, ValidationError};
use crate::query::QueryResult;

pub const DEFAULT_LIMIT: u64 = 8;

/// Raw navigation parameters as handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
  pub skip: Option<String>,
  pub limit: Option<String>,
}

/// Window into the product list. `limit` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaginationState {
  skip: u64,
  limit: u64,
}

impl Default for PaginationState {
  fn default() -> Self {
    Self {
      skip: 0,
      limit: DEFAULT_LIMIT,
    }
  }
}

impl PaginationState {
  /// A zero `limit` is replaced by [`DEFAULT_LIMIT`].
  pub fn new(skip: u64, limit: u64) -> Self {
    Self {
      skip,
      limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
    }
  }

  pub fn skip(&self) -> u64 {
    self.skip
  }

  pub fn limit(&self) -> u64 {
    self.limit
  }

  /// Derive a state from raw parameters. Never fails: missing or invalid
  /// values fall back to `skip = 0` and `limit = default_limit`.
  pub fn parse(raw: &RawParams, default_limit: u64) -> Self {
    let default_limit = if default_limit == 0 {
      DEFAULT_LIMIT
    } else {
      default_limit
    };

    let skip = parse_param("skip", raw.skip.as_deref())
      .and_then(|skip| {
        u64::try_from(skip).map_err(|_| ValidationError {
          name: "skip",
          value: skip.to_string(),
        })
      })
      .unwrap_or_else(|e| recover(e, 0));

    let limit = parse_param("limit", raw.limit.as_deref())
      .and_then(|limit| match u64::try_from(limit) {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(ValidationError {
          name: "limit",
          value: limit.to_string(),
        }),
      })
      .unwrap_or_else(|e| recover(e, default_limit));

    Self { skip, limit }
  }

  /// Parse a query string such as `skip=4&limit=8`.
  pub fn from_query(query: &str, default_limit: u64) -> Self {
    let mut raw = RawParams::default();
    for (name, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
      match name.as_ref() {
        "skip" => raw.skip = Some(value.into_owned()),
        "limit" => raw.limit = Some(value.into_owned()),
        _ => {}
      }
    }
    Self::parse(&raw, default_limit)
  }

  pub fn encode(&self) -> RawParams {
    RawParams {
      skip: Some(self.skip.to_string()),
      limit: Some(self.limit.to_string()),
    }
  }

  /// Encode as a query string, `skip` first.
  pub fn to_query(&self) -> String {
    form_urlencoded::Serializer::new(String::new())
      .append_pair("skip", &self.skip.to_string())
      .append_pair("limit", &self.limit.to_string())
      .finish()
  }

  /// Shift the window by `delta`, never below zero.
  pub fn move_by(&self, delta: i64) -> Self {
    let skip = if delta.is_negative() {
      self.skip.saturating_sub(delta.unsigned_abs())
    } else {
      self.skip.saturating_add(delta.unsigned_abs())
    };
    Self {
      skip,
      limit: self.limit,
    }
  }

  /// "Previous" is enabled only once a full page has been skipped.
  pub fn has_previous(&self) -> bool {
    self.skip >= self.limit
  }

  /// "Next" is enabled while the window ends before `total`.
  pub fn has_next(&self, total: u64) -> bool {
    self.skip.saturating_add(self.limit) < total
  }
}

fn parse_param(name: &'static str, raw: Option<&str>) -> Result<i64, ValidationError> {
  let value = raw.map(str::trim).unwrap_or_default();
  value.parse::<i64>().map_err(|_| ValidationError {
    name,
    value: value.to_string(),
  })
}

fn recover(e: ValidationError, default: u64) -> u64 {
  if !e.value.is_empty() {
    debug!(error = %e, default, "Invalid pagination parameter, using default");
  }
  default
}

/// Lifecycle of the controller's current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
  /// Nothing requested yet
  Idle,
  Loading,
  Loaded,
  Failed,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
  pub status: PageStatus,
  pub pagination: PaginationState,
  pub enable_prev: bool,
  pub enable_next: bool,
  pub data: Option<ProductListResult>,
  pub error: Option<ErrorInfo>,
}

/// Loads the page for the current [`PaginationState`] through the query cache.
///
/// Every view change is published on a watch channel, so a consumer can
/// observe `Loading` while a fetch is outstanding.
pub struct PaginationController {
  client: CachedCatalogClient,
  pagination: PaginationState,
  status: PageStatus,
  result: QueryResult<ProductListResult>,
  tx: watch::Sender<PageView>,
}

impl PaginationController {
  pub fn new(client: CachedCatalogClient, pagination: PaginationState) -> Self {
    let (tx, _rx) = watch::channel(PageView {
      status: PageStatus::Idle,
      pagination,
      enable_prev: pagination.has_previous(),
      enable_next: false,
      data: None,
      error: None,
    });
    Self {
      client,
      pagination,
      status: PageStatus::Idle,
      result: QueryResult::idle(),
      tx,
    }
  }

  pub fn pagination(&self) -> PaginationState {
    self.pagination
  }

  pub fn status(&self) -> PageStatus {
    self.status
  }

  pub fn subscribe(&self) -> watch::Receiver<PageView> {
    self.tx.subscribe()
  }

  pub fn view(&self) -> PageView {
    PageView {
      status: self.status,
      pagination: self.pagination,
      enable_prev: self.pagination.has_previous(),
      enable_next: self
        .result
        .data()
        .is_some_and(|page| self.pagination.has_next(page.total)),
      data: self.result.data.clone(),
      error: self.result.error.clone(),
    }
  }

  /// Request the page for the current state.
  pub async fn load(&mut self) -> PageView {
    self.status = PageStatus::Loading;
    self.result = QueryResult::idle();
    self.publish();

    let result = self.client.products(&self.pagination).await;
    self.status = if result.is_success() {
      PageStatus::Loaded
    } else {
      PageStatus::Failed
    };
    self.result = result;
    debug!(
      skip = self.pagination.skip(),
      limit = self.pagination.limit(),
      status = ?self.status,
      "Page resolved"
    );

    self.publish();
    self.view()
  }

  /// Switch to `pagination`. Loads when the state changed or nothing has been
  /// requested yet.
  pub async fn navigate(&mut self, pagination: PaginationState) -> PageView {
    if pagination == self.pagination && self.status != PageStatus::Idle {
      return self.view();
    }
    self.pagination = pagination;
    self.load().await
  }

  /// `navigate(current.move_by(delta))`
  pub async fn move_by(&mut self, delta: i64) -> PageView {
    let next = self.pagination.move_by(delta);
    self.navigate(next).await
  }

  fn publish(&self) {
    self.tx.send_replace(self.view());
  }
}
