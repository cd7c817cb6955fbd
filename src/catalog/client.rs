use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;

use super::api_types::{into_category_list, ApiCategory, ApiProduct, ApiProductsResponse};
use super::types::{CategoryList, Product, ProductListResult, ProductPatch};

/// Remote catalog service.
///
/// Implementations perform exactly one request per call; retries, caching and
/// deduplication happen above this trait.
#[async_trait]
pub trait CatalogApi: Send + Sync {
  /// `GET /products?limit={limit}&skip={skip}`
  async fn list_products(&self, skip: u64, limit: u64) -> Result<ProductListResult, FetchError>;

  /// `GET /products/categories`
  async fn list_categories(&self) -> Result<CategoryList, FetchError>;

  /// `GET /products/{id}`
  async fn get_product(&self, id: &str) -> Result<Product, FetchError>;

  /// `PUT /products/{id}` with a partial product body
  async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, FetchError>;
}

/// HTTP client for the catalog service
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base_url: Url,
}

impl CatalogClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid catalog URL {}: {}", config.api.base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .user_agent(concat!("catalog-query/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::Network(format!("{} cannot be a base URL", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// Check the status and decode the body as `T`.
  async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
      return Err(http_error(status, response).await);
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
  }
}

async fn http_error(status: StatusCode, response: Response) -> FetchError {
  let body = response.text().await.unwrap_or_default();
  let message = match body.trim() {
    "" => status.to_string(),
    text => format!("{}: {}", status, text),
  };
  FetchError::Http {
    status_code: status.as_u16(),
    message,
  }
}

#[async_trait]
impl CatalogApi for CatalogClient {
  async fn list_products(&self, skip: u64, limit: u64) -> Result<ProductListResult, FetchError> {
    let mut url = self.endpoint(&["products"])?;
    url
      .query_pairs_mut()
      .append_pair("limit", &limit.to_string())
      .append_pair("skip", &skip.to_string());
    debug!(%url, "GET products");

    let response = self.http.get(url).send().await?;
    let page: ApiProductsResponse = Self::decode(response).await?;
    Ok(page.into())
  }

  async fn list_categories(&self) -> Result<CategoryList, FetchError> {
    let url = self.endpoint(&["products", "categories"])?;
    debug!(%url, "GET categories");

    let response = self.http.get(url).send().await?;
    let categories: Vec<ApiCategory> = Self::decode(response).await?;
    Ok(into_category_list(categories))
  }

  async fn get_product(&self, id: &str) -> Result<Product, FetchError> {
    let url = self.endpoint(&["products", id])?;
    debug!(%url, "GET product");

    let response = self.http.get(url).send().await?;
    let product: ApiProduct = Self::decode(response).await?;
    Ok(product.into())
  }

  async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, FetchError> {
    let url = self.endpoint(&["products", id])?;
    debug!(%url, "PUT product");

    let body = serde_json::to_vec(patch)?;
    let response = self
      .http
      .put(url)
      .header(reqwest::header::CONTENT_TYPE, "application/json")
      .body(body)
      .send()
      .await?;
    let product: ApiProduct = Self::decode(response).await?;
    Ok(product.into())
  }
}
