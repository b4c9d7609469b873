//! Data models for the learning platform.
//!
//! This module contains the records carried in the user bundle:
//!
//! - `Profile`, `Child`: the signed-in account holder and their children
//! - `Booklet`, `BookletModule`, `Activity`: learning progress per child
//! - `TokenAccount`: reward-currency balance per child
//! - `UserBundle`, `BundlePatch`: the cached aggregate and partial updates to it
//!
//! Records are opaque to the cache. Each one names the fields the client
//! reads and keeps everything else in a flattened `extra` map so nothing is
//! lost when a bundle is written to disk and read back.

pub mod booklet;
pub mod bundle;
pub mod profile;
pub mod tokens;

pub use booklet::{Activity, ActivityProgress, Booklet, BookletModule};
pub use bundle::{BundlePatch, BundlePayload, BundleResponse, UserBundle};
pub use profile::{Child, Profile};
pub use tokens::TokenAccount;

// Helper to deserialize an explicit null as the type's default. Rows come
// from nullable columns, and `#[serde(default)]` alone only covers a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;

    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
