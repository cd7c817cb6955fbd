//! Writes against the catalog service and cache reconciliation.
//!
//! A mutation is a single attempt. Nothing is written to the cache before the
//! service confirms: on success the affected keys are invalidated so the next
//! read refetches, on failure the cache is left exactly as it was.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::cache::QueryExecutor;
use crate::catalog::keys::{is_product_page, product_key};
use crate::catalog::{CatalogApi, CatalogData, Product, ProductPatch};
use crate::error::ErrorInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
  pub target_id: String,
  pub patch: ProductPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
  pub success: bool,
  pub updated: Option<Product>,
  pub error: Option<ErrorInfo>,
}

/// Lifecycle of the latest mutation for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationStatus {
  #[default]
  Idle,
  InFlight,
  Succeeded,
  Failed,
}

/// Performs product updates and invalidates what they affect.
///
/// Concurrent mutations of the same target are not serialized. Each one
/// invalidates on its own completion, so the last to complete decides the
/// final status.
#[derive(Clone)]
pub struct MutationCoordinator {
  api: Arc<dyn CatalogApi>,
  executor: QueryExecutor<CatalogData>,
  invalidate_lists: bool,
  statuses: Arc<Mutex<HashMap<String, MutationStatus>>>,
}

impl MutationCoordinator {
  pub fn new(api: Arc<dyn CatalogApi>, executor: QueryExecutor<CatalogData>) -> Self {
    Self {
      api,
      executor,
      invalidate_lists: true,
      statuses: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Whether product pages are invalidated along with the detail entry.
  pub fn with_list_invalidation(mut self, enabled: bool) -> Self {
    self.invalidate_lists = enabled;
    self
  }

  pub fn status(&self, target_id: &str) -> MutationStatus {
    self
      .lock_statuses()
      .get(target_id)
      .copied()
      .unwrap_or_default()
  }

  pub async fn mutate(&self, request: MutationRequest) -> MutationResult {
    let target_id = request.target_id;
    self.set_status(&target_id, MutationStatus::InFlight);

    match self.api.update_product(&target_id, &request.patch).await {
      Ok(updated) => {
        let detail = product_key(&target_id);
        let invalidate_lists = self.invalidate_lists;
        let invalidated = self
          .executor
          .invalidate(|key| *key == detail || (invalidate_lists && is_product_page(key)));
        info!(
          target_id = %target_id,
          invalidated = invalidated.len(),
          "Mutation succeeded"
        );

        self.set_status(&target_id, MutationStatus::Succeeded);
        MutationResult {
          success: true,
          updated: Some(updated),
          error: None,
        }
      }
      Err(e) => {
        warn!(target_id = %target_id, error = %e, "Mutation failed");
        self.set_status(&target_id, MutationStatus::Failed);
        MutationResult {
          success: false,
          updated: None,
          error: Some(e.into()),
        }
      }
    }
  }

  fn set_status(&self, target_id: &str, status: MutationStatus) {
    self
      .lock_statuses()
      .insert(target_id.to_string(), status);
  }

  fn lock_statuses(&self) -> MutexGuard<'_, HashMap<String, MutationStatus>> {
    self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
