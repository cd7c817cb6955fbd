//! Query keys for catalog resources.

use crate::cache::QueryKey;
use crate::pagination::PaginationState;

pub const PRODUCTS: &str = "products";
pub const PRODUCT: &str = "product";
pub const CATEGORIES: &str = "categories";

/// `(products, {skip, limit})`
pub fn products_key(state: &PaginationState) -> QueryKey {
  QueryKey::new(PRODUCTS)
    .with("skip", state.skip())
    .with("limit", state.limit())
}

/// `(product, {id})`
pub fn product_key(id: &str) -> QueryKey {
  QueryKey::new(PRODUCT).with("id", id)
}

/// `(categories, {})`
pub fn categories_key() -> QueryKey {
  QueryKey::new(CATEGORIES)
}

pub fn is_product_page(key: &QueryKey) -> bool {
  key.resource() == PRODUCTS
}
