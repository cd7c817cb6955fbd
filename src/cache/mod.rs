//! Query cache: keys, entries, the store, persistence and the executor.
//!
//! This module is catalog-agnostic:
//! - [`CacheStore`] holds exactly one [`CacheEntry`] per [`QueryKey`]
//! - [`QueryExecutor`] deduplicates concurrent fetches for the same key and
//!   records their outcome, discarding responses superseded by a newer
//!   request or an invalidation
//! - [`SqliteStorage`] optionally persists successful entries across runs

mod entry;
mod executor;
mod key;
mod storage;
mod store;

pub use entry::{CacheEntry, CacheStatus};
pub use executor::QueryExecutor;
pub use key::QueryKey;
pub use storage::SqliteStorage;
pub use store::{CacheStore, InvalidationMode};
