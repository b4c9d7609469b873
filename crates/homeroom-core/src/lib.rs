//! Core library for homeroom.
//!
//! Provides the bundle cache that screens read the signed-in account's data
//! from, the API client that fills it, the session holding the access token,
//! and the data models carried in the bundle.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionData};
pub use cache::{BundleCache, BundleSource, CacheStatus, FileStore, KeyValueStore, MemoryStore};
pub use config::Config;
pub use models::{BundlePatch, UserBundle};
