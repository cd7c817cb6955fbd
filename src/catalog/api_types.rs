//! Serde-deserializable types matching catalog service responses.
//!
//! These types are separate from domain types so that presence checks live in
//! one place: a payload that doesn't decode here becomes a parse error instead
//! of reaching the rest of the crate.

use serde::Deserialize;

use super::types::{CategoryList, Product, ProductListResult};

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProduct {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub price: f64,
  pub brand: Option<String>,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub images: Vec<String>,
  pub thumbnail: Option<String>,
  #[serde(default)]
  pub discount_percentage: f64,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub stock: i64,
}

impl From<ApiProduct> for Product {
  fn from(p: ApiProduct) -> Self {
    Product {
      id: p.id,
      title: p.title,
      category: p.category,
      price: p.price,
      brand: p.brand,
      description: p.description,
      images: p.images,
      thumbnail: p.thumbnail,
      discount_percentage: p.discount_percentage,
      rating: p.rating,
      stock: p.stock,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiProductsResponse {
  pub products: Vec<ApiProduct>,
  pub total: u64,
}

impl From<ApiProductsResponse> for ProductListResult {
  fn from(r: ApiProductsResponse) -> Self {
    ProductListResult {
      items: r.products.into_iter().map(Product::from).collect(),
      total: r.total,
    }
  }
}

// ============================================================================
// Categories
// ============================================================================

/// Older service versions return bare names, newer ones return objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiCategory {
  Name(String),
  Object {
    slug: Option<String>,
    name: Option<String>,
  },
}

impl ApiCategory {
  fn into_name(self) -> String {
    match self {
      ApiCategory::Name(name) => name,
      ApiCategory::Object { slug, name } => slug.or(name).unwrap_or_default(),
    }
  }
}

pub fn into_category_list(categories: Vec<ApiCategory>) -> CategoryList {
  CategoryList::new(categories.into_iter().map(ApiCategory::into_name).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_product_list() {
    let body = r#"{
      "products": [{
        "id": 1,
        "title": "iPhone 9",
        "category": "smartphones",
        "price": 549,
        "brand": "Apple",
        "description": "An apple mobile",
        "images": ["a.jpg", "b.jpg"],
        "thumbnail": "t.jpg",
        "discountPercentage": 12.96,
        "rating": 4.69,
        "stock": 94
      }],
      "total": 100,
      "skip": 0,
      "limit": 1
    }"#;
    let response: ApiProductsResponse = serde_json::from_str(body).unwrap();
    let page = ProductListResult::from(response);
    assert_eq!(page.total, 100);
    assert_eq!(page.items[0].title, "iPhone 9");
    assert_eq!(page.items[0].discount_percentage, 12.96);
    assert_eq!(page.items[0].image(1), Some("b.jpg"));
    assert_eq!(page.items[0].image(4), None);
  }

  #[test]
  fn test_missing_total_is_rejected() {
    let body = r#"{ "products": [] }"#;
    assert!(serde_json::from_str::<ApiProductsResponse>(body).is_err());
  }

  #[test]
  fn test_product_without_title_is_rejected() {
    let body = r#"{ "id": 3 }"#;
    assert!(serde_json::from_str::<ApiProduct>(body).is_err());
  }

  #[test]
  fn test_sparse_product_gets_defaults() {
    let product: Product = serde_json::from_str::<ApiProduct>(r#"{ "id": 3, "title": "x" }"#)
      .unwrap()
      .into();
    assert!(product.images.is_empty());
    assert_eq!(product.stock, 0);
  }

  #[test]
  fn test_categories_in_both_shapes() {
    let names: Vec<ApiCategory> = serde_json::from_str(r#"["smartphones", "laptops"]"#).unwrap();
    let objects: Vec<ApiCategory> = serde_json::from_str(
      r#"[{"slug": "beauty", "name": "Beauty", "url": "u"}, {"slug": "fragrances", "name": "Fragrances"}]"#,
    )
    .unwrap();

    let names = into_category_list(names);
    assert_eq!(names.iter().collect::<Vec<_>>(), vec!["smartphones", "laptops"]);
    let objects = into_category_list(objects);
    assert_eq!(objects.iter().collect::<Vec<_>>(), vec!["beauty", "fragrances"]);
  }
}
