pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod keys;
pub mod types;

pub use cached_client::CachedCatalogClient;
pub use client::{CatalogApi, CatalogClient};
pub use types::{CatalogData, CategoryList, Product, ProductListResult, ProductPatch};
