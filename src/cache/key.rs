//! Query keys: the identity of a cacheable request.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A primitive parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  Bool(bool),
  Int(i64),
  Str(String),
}

impl From<i64> for ParamValue {
  fn from(v: i64) -> Self {
    ParamValue::Int(v)
  }
}

impl From<u64> for ParamValue {
  fn from(v: u64) -> Self {
    ParamValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
  }
}

impl From<bool> for ParamValue {
  fn from(v: bool) -> Self {
    ParamValue::Bool(v)
  }
}

impl From<&str> for ParamValue {
  fn from(v: &str) -> Self {
    ParamValue::Str(v.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(v: String) -> Self {
    ParamValue::Str(v)
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Bool(b) => write!(f, "{}", b),
      ParamValue::Int(i) => write!(f, "{}", i),
      ParamValue::Str(s) => write!(f, "{:?}", s),
    }
  }
}

/// Resource kind plus parameters.
///
/// Two keys are equal iff the resource kind and every parameter value match.
/// Parameters are kept in a `BTreeMap` so that insertion order never affects
/// identity or the stable hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
  resource: String,
  params: BTreeMap<String, ParamValue>,
}

impl QueryKey {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      params: BTreeMap::new(),
    }
  }

  /// Add (or replace) a parameter.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  /// Stable, fixed-length hash used as the persistent storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.resource.as_bytes());
    for (name, value) in &self.params {
      hasher.update(b"\0");
      hasher.update(name.as_bytes());
      hasher.update(b"=");
      hasher.update(value.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{{", self.resource)?;
    for (i, (name, value)) in self.params.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{}: {}", name, value)?;
    }
    f.write_str("}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_order_does_not_affect_identity() {
    let a = QueryKey::new("products").with("skip", 0i64).with("limit", 8i64);
    let b = QueryKey::new("products").with("limit", 8i64).with("skip", 0i64);
    assert_eq!(a, b);
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_string_and_int_params_differ() {
    let a = QueryKey::new("product").with("id", "7");
    let b = QueryKey::new("product").with("id", 7i64);
    assert_ne!(a, b);
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_resource_is_part_of_identity() {
    let a = QueryKey::new("product").with("id", "1");
    let b = QueryKey::new("products").with("id", "1");
    assert_ne!(a, b);
  }

  #[test]
  fn test_display() {
    let key = QueryKey::new("products").with("skip", 4i64).with("limit", 8i64);
    assert_eq!(key.to_string(), "products{limit: 8, skip: 4}");
    assert_eq!(key.cache_hash().len(), 64);
  }
}
