//! Catalog access through the shared query cache.

use std::sync::Arc;

use crate::cache::QueryExecutor;
use crate::pagination::PaginationState;
use crate::query::QueryResult;

use super::client::CatalogApi;
use super::keys::{categories_key, product_key, products_key};
use super::types::{CatalogData, CategoryList, Product, ProductListResult};

/// Catalog client with transparent caching.
///
/// Each method binds a query key to the matching remote call and resolves it
/// through the executor, so repeated and concurrent reads share one request.
#[derive(Clone)]
pub struct CachedCatalogClient {
  api: Arc<dyn CatalogApi>,
  executor: QueryExecutor<CatalogData>,
}

impl CachedCatalogClient {
  pub fn new(api: Arc<dyn CatalogApi>, executor: QueryExecutor<CatalogData>) -> Self {
    Self { api, executor }
  }

  pub fn api(&self) -> &Arc<dyn CatalogApi> {
    &self.api
  }

  pub fn executor(&self) -> &QueryExecutor<CatalogData> {
    &self.executor
  }

  /// One page of products.
  pub async fn products(&self, state: &PaginationState) -> QueryResult<ProductListResult> {
    let key = products_key(state);
    let (skip, limit) = (state.skip(), state.limit());

    let entry = self
      .executor
      .execute(&key, || {
        let api = Arc::clone(&self.api);
        async move {
          api
            .list_products(skip, limit)
            .await
            .map(CatalogData::ProductPage)
        }
      })
      .await;

    QueryResult::from_entry(entry, CatalogData::into_product_page)
  }

  /// A single product by id.
  pub async fn product(&self, id: &str) -> QueryResult<Product> {
    let key = product_key(id);

    let entry = self
      .executor
      .execute(&key, || {
        let api = Arc::clone(&self.api);
        let id = id.to_string();
        async move { api.get_product(&id).await.map(CatalogData::Product) }
      })
      .await;

    QueryResult::from_entry(entry, CatalogData::into_product)
  }

  /// Category names, in server order.
  pub async fn categories(&self) -> QueryResult<CategoryList> {
    let entry = self
      .executor
      .execute(&categories_key(), || {
        let api = Arc::clone(&self.api);
        async move { api.list_categories().await.map(CatalogData::Categories) }
      })
      .await;

    QueryResult::from_entry(entry, CatalogData::into_categories)
  }
}


#[cfg(test)]
mod tests {
  use super::testing::FakeCatalog;
  use super::*;
  use crate::cache::CacheStore;
  use crate::error::{ErrorKind, FetchError};
  use std::sync::atomic::Ordering;

  fn client(fake: Arc<FakeCatalog>) -> CachedCatalogClient {
    CachedCatalogClient::new(fake, QueryExecutor::new(Arc::new(CacheStore::new())))
  }

  #[tokio::test]
  async fn test_products_are_cached_per_page() {
    let fake = Arc::new(FakeCatalog::with_products(20));
    let client = client(fake.clone());

    let first = client.products(&PaginationState::new(0, 8)).await;
    assert!(first.is_success());
    assert_eq!(first.data().unwrap().items.len(), 8);
    assert_eq!(first.data().unwrap().total, 20);

    client.products(&PaginationState::new(0, 8)).await;
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);

    let second = client.products(&PaginationState::new(8, 8)).await;
    assert_eq!(second.data().unwrap().items[0].id, 9);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_product_not_found_is_http_error() {
    let fake = Arc::new(FakeCatalog::with_products(3));
    let client = client(fake);

    let result = client.product("42").await;
    assert!(result.is_error());
    assert_eq!(
      result.error().unwrap().kind,
      ErrorKind::HttpError { status_code: 404 }
    );
  }

  #[tokio::test]
  async fn test_concurrent_detail_reads_share_request() {
    let fake = Arc::new(FakeCatalog::with_products(3));
    let client = client(fake.clone());

    let (a, b) = tokio::join!(client.product("2"), client.product("2"));
    assert_eq!(a, b);
    assert_eq!(a.data().unwrap().title, "Product 2");
    assert_eq!(fake.get_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_categories_keep_server_order() {
    let fake = Arc::new(FakeCatalog::with_products(1));
    let client = client(fake.clone());

    let categories = client.categories().await;
    let names: Vec<&str> = categories.data().unwrap().iter().collect();
    assert_eq!(names, vec!["smartphones", "laptops"]);

    client.categories().await;
    assert_eq!(fake.category_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_parse_error_surfaces_as_error_status() {
    let fake = Arc::new(FakeCatalog::with_products(1));
    fake.fail_with(FetchError::Parse("expected value at line 1".to_string()));
    let client = client(fake);

    let result = client.categories().await;
    assert!(result.is_error());
    assert_eq!(result.error().unwrap().kind, ErrorKind::ParseError);
  }
}
