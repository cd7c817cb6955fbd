//! Plain-text output for the CLI.

use std::io::{self, Write};

use crate::catalog::{CategoryList, Product};
use crate::error::ErrorInfo;
use crate::mutation::MutationResult;
use crate::pagination::{PageStatus, PageView};
use crate::query::{QueryResult, QueryStatus};

pub fn page<W: Write>(
  out: &mut W,
  view: &PageView,
  categories: &QueryResult<CategoryList>,
  step: i64,
) -> io::Result<()> {
  match view.status {
    PageStatus::Idle | PageStatus::Loading => return writeln!(out, "Loading..."),
    PageStatus::Failed => {
      return error(out, view.error.as_ref());
    }
    PageStatus::Loaded => {}
  }

  if let Some(categories) = categories.data() {
    let names: Vec<&str> = categories.iter().collect();
    writeln!(out, "Categories: {}", names.join(", "))?;
    writeln!(out)?;
  }

  if let Some(data) = &view.data {
    for product in &data.items {
      writeln!(
        out,
        "{:>4}  {:<40} {:<20} ₹{}",
        product.id, product.title, product.category, product.price
      )?;
    }
    writeln!(out)?;
    if data.items.is_empty() {
      writeln!(out, "No products at offset {} of {}", view.pagination.skip(), data.total)?;
    } else {
      writeln!(
        out,
        "Showing {}-{} of {}",
        view.pagination.skip() + 1,
        view.pagination.skip() + data.items.len() as u64,
        data.total
      )?;
    }
  }

  let prev = view.pagination.move_by(step.saturating_neg());
  let next = view.pagination.move_by(step);
  writeln!(
    out,
    "Prev: {}",
    if view.enable_prev {
      prev.to_query()
    } else {
      "disabled".to_string()
    }
  )?;
  writeln!(
    out,
    "Next: {}",
    if view.enable_next {
      next.to_query()
    } else {
      "disabled".to_string()
    }
  )
}

pub fn product<W: Write>(out: &mut W, result: &QueryResult<Product>) -> io::Result<()> {
  let product = match (result.status, result.data()) {
    (QueryStatus::Success, Some(product)) => product,
    (QueryStatus::Error, _) => return error(out, result.error()),
    _ => return writeln!(out, "Loading..."),
  };

  if let Some(brand) = &product.brand {
    writeln!(out, "{}", brand)?;
  }
  writeln!(out, "{}", product.title)?;
  writeln!(out)?;
  writeln!(out, "Category: {}", product.category)?;
  if !product.description.is_empty() {
    writeln!(out, "{}", product.description)?;
  }
  writeln!(out, "Discount Percentage: {}", product.discount_percentage)?;
  writeln!(out, "Price: {}", product.price)?;
  writeln!(out, "Rating: {}", product.rating)?;
  writeln!(out, "Stock: {}", product.stock)?;
  // Main image plus up to four thumbnails
  for image in (0..5).filter_map(|i| product.image(i)) {
    writeln!(out, "Image: {}", image)?;
  }
  Ok(())
}

pub fn categories<W: Write>(out: &mut W, result: &QueryResult<CategoryList>) -> io::Result<()> {
  match (result.status, result.data()) {
    (QueryStatus::Success, Some(categories)) => {
      for name in categories.iter() {
        writeln!(out, "{}", name)?;
      }
      Ok(())
    }
    (QueryStatus::Error, _) => error(out, result.error()),
    _ => writeln!(out, "Loading..."),
  }
}

pub fn mutation<W: Write>(out: &mut W, result: &MutationResult) -> io::Result<()> {
  match (&result.updated, &result.error) {
    (Some(product), _) if result.success => {
      writeln!(out, "Updated product {}: {}", product.id, product.title)
    }
    (_, Some(e)) => writeln!(out, "Error while updating. {}", e),
    _ => writeln!(out, "Error while updating."),
  }
}

fn error<W: Write>(out: &mut W, error: Option<&ErrorInfo>) -> io::Result<()> {
  match error {
    Some(e) => writeln!(out, "Error: {}", e.message),
    None => writeln!(out, "Error"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::cached_client::testing;
  use crate::catalog::ProductListResult;
  use crate::error::ErrorKind;
  use crate::pagination::PaginationState;

  fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
    let mut out = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  #[test]
  fn test_page_with_navigation_hints() {
    let view = PageView {
      status: PageStatus::Loaded,
      pagination: PaginationState::new(0, 2),
      enable_prev: false,
      enable_next: true,
      data: Some(ProductListResult {
        items: vec![testing::product(1), testing::product(2)],
        total: 20,
      }),
      error: None,
    };
    let categories = QueryResult {
      status: QueryStatus::Success,
      data: Some(CategoryList::new(vec!["laptops".to_string()])),
      error: None,
    };

    let text = render(|out| page(out, &view, &categories, 4));
    assert!(text.contains("Categories: laptops"));
    assert!(text.contains("Product 2"));
    assert!(text.contains("Showing 1-2 of 20"));
    assert!(text.contains("Prev: disabled"));
    assert!(text.contains("Next: skip=4&limit=2"));
  }

  #[test]
  fn test_empty_page_past_the_end() {
    let view = PageView {
      status: PageStatus::Loaded,
      pagination: PaginationState::new(100, 8),
      enable_prev: true,
      enable_next: false,
      data: Some(ProductListResult {
        items: Vec::new(),
        total: 100,
      }),
      error: None,
    };

    let text = render(|out| page(out, &view, &QueryResult::idle(), i64::MAX));
    assert!(text.contains("No products at offset 100 of 100"));
    assert!(!text.contains("Showing"));
    assert!(text.contains("Prev: skip=0&limit=8"));
    assert!(text.contains("Next: disabled"));
  }

  #[test]
  fn test_failed_page_shows_message() {
    let view = PageView {
      status: PageStatus::Failed,
      pagination: PaginationState::default(),
      enable_prev: false,
      enable_next: false,
      data: None,
      error: Some(ErrorInfo::new(ErrorKind::Timeout, "request timed out")),
    };
    let text = render(|out| page(out, &view, &QueryResult::idle(), 4));
    assert_eq!(text, "Error: request timed out\n");
  }

  #[test]
  fn test_product_detail_lists_available_images() {
    let result = QueryResult {
      status: QueryStatus::Success,
      data: Some(testing::product(7)),
      error: None,
    };
    let text = render(|out| product(out, &result));
    assert!(text.contains("Product 7"));
    assert!(text.contains("Stock: 10"));
    assert_eq!(text.matches("Image: ").count(), 2);
  }
}
