//! REST API client module for the learning platform backend.
//!
//! This module provides the `ApiClient` for fetching the consolidated user
//! bundle (profile, children, booklets, token accounts, recent activity)
//! in a single request.
//!
//! Requests carry the access token of the signed-in session as a bearer
//! token. How that token is obtained is up to the auth provider.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
