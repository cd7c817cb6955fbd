use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: u64,
  pub title: String,
  pub category: String,
  pub price: f64,
  pub brand: Option<String>,
  pub description: String,
  pub images: Vec<String>,
  pub thumbnail: Option<String>,
  pub discount_percentage: f64,
  pub rating: f64,
  pub stock: i64,
}

impl Product {
  /// Image at `index`, if the service provided that many.
  pub fn image(&self, index: usize) -> Option<&str> {
    self.images.get(index).map(String::as_str)
  }
}

/// One page of products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListResult {
  pub items: Vec<Product>,
  pub total: u64,
}

/// Category names in the order the service returned them.
///
/// Equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryList(Vec<String>);

impl CategoryList {
  pub fn new(names: Vec<String>) -> Self {
    Self(names)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

impl PartialEq for CategoryList {
  fn eq(&self, other: &Self) -> bool {
    let a: BTreeSet<&String> = self.0.iter().collect();
    let b: BTreeSet<&String> = other.0.iter().collect();
    a == b
  }
}

/// Partial product sent with an update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub brand: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub discount_percentage: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stock: Option<i64>,
}

impl ProductPatch {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

/// Everything the catalog stores in the query cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatalogData {
  ProductPage(ProductListResult),
  Product(Product),
  Categories(CategoryList),
}

impl CatalogData {
  pub fn into_product_page(self) -> Option<ProductListResult> {
    match self {
      CatalogData::ProductPage(page) => Some(page),
      _ => None,
    }
  }

  pub fn into_product(self) -> Option<Product> {
    match self {
      CatalogData::Product(product) => Some(product),
      _ => None,
    }
  }

  pub fn into_categories(self) -> Option<CategoryList> {
    match self {
      CatalogData::Categories(categories) => Some(categories),
      _ => None,
    }
  }
}
