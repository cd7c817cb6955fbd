use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::InvalidationMode;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub pagination: PaginationConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub mutation: MutationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the catalog service
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
  /// Page size used when `limit` is absent or invalid
  #[serde(default = "default_limit")]
  pub default_limit: u64,
  /// How far next/prev move the window
  #[serde(default = "default_step")]
  pub step: u64,
}

impl Default for PaginationConfig {
  fn default() -> Self {
    Self {
      default_limit: default_limit(),
      step: default_step(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a cached result is refetched; `null` keeps results
  /// until invalidated
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: Option<u64>,
  /// Persist successful results between runs
  #[serde(default = "default_true")]
  pub persist: bool,
  /// Database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
  /// `remove` drops invalidated results, `mark_stale` keeps them flagged
  #[serde(default)]
  pub invalidation: InvalidationMode,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
      persist: true,
      path: None,
      invalidation: InvalidationMode::Remove,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationConfig {
  /// Also invalidate product pages after a successful update
  #[serde(default = "default_true")]
  pub invalidate_lists: bool,
}

impl Default for MutationConfig {
  fn default() -> Self {
    Self {
      invalidate_lists: true,
    }
  }
}

fn default_base_url() -> String {
  "https://dummyjson.com".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_limit() -> u64 {
  8
}

fn default_step() -> u64 {
  4
}

fn default_ttl_secs() -> Option<u64> {
  Some(300)
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./catalog.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/catalog-query/config.yaml
  ///
  /// Without any file, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("catalog.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("catalog-query").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.pagination.default_limit == 0 {
      return Err(eyre!("pagination.default_limit must be greater than zero"));
    }
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "https://dummyjson.com");
    assert_eq!(config.pagination.default_limit, 8);
    assert_eq!(config.pagination.step, 4);
    assert_eq!(config.cache.ttl_secs, Some(300));
    assert!(config.cache.persist);
    assert!(config.mutation.invalidate_lists);
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      "api:\n  base_url: http://localhost:8080\ncache:\n  ttl_secs: null\n  invalidation: mark_stale\n",
    )
    .unwrap();
    assert_eq!(config.api.base_url, "http://localhost:8080");
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.cache.ttl_secs, None);
    assert_eq!(config.cache.invalidation, InvalidationMode::MarkStale);
    assert_eq!(config.pagination.default_limit, 8);
  }

  #[test]
  fn test_zero_limit_is_rejected() {
    assert!(Config::parse("pagination:\n  default_limit: 0\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/catalog.yaml"))).is_err());
  }
}
