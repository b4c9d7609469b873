//! Local caching module for the user bundle.
//!
//! This module provides the `BundleCache`, a session-scoped store that
//! serves the signed-in account's bundle to consumers, refetches it from
//! the API once it is older than 30 minutes, and accepts partial updates
//! from flows that changed server state.
//!
//! The bundle is persisted as JSON through a `KeyValueStore`:
//! - `FileStore` keeps one file per key in the session's cache directory
//! - `MemoryStore` keeps entries in process, for ephemeral sessions and tests

pub mod bundle;
pub mod freshness;
mod persist;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::BundlePayload;

pub use bundle::{BundleCache, CacheStatus, BUNDLE_CACHE_KEY};
pub use freshness::CACHE_EXPIRY_MINUTES;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Where fresh bundles come from. Implemented by `ApiClient`.
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn fetch_bundle(&self) -> Result<BundlePayload>;
}
