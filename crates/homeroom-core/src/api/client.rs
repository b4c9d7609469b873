//! API client for communicating with the learning platform REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests to fetch the user bundle.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::cache::BundleSource;
use crate::models::{BundlePayload, BundleResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when neither the environment nor the config names one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Path of the consolidated bundle endpoint.
const USER_BUNDLE_PATH: &str = "/api/v1/user/bundle";

/// Path of the unauthenticated health endpoint.
const HEALTH_PATH: &str = "/health";

/// HTTP request timeout in seconds.
/// This is the only bound on an in-flight bundle fetch.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the learning platform.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let token = self.token.as_deref().ok_or(ApiError::NoSession)?;
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Access token is not a valid header value")?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// Fetch the consolidated user bundle for the signed-in account
    pub async fn fetch_user_bundle(&self) -> Result<BundlePayload> {
        let url = self.url(USER_BUNDLE_PATH);
        debug!(url = %url, "Fetching user bundle");

        let response: BundleResponse = self.get(&url).await?;
        if !response.success {
            warn!("Bundle response did not report success");
        }

        info!(
            children = response.data.children.len(),
            booklets = response.data.booklets.len(),
            token_accounts = response.data.token_accounts.len(),
            "User bundle fetched"
        );
        Ok(response.data)
    }

    /// Check whether the API server is reachable. Does not need a session.
    pub async fn health_check(&self) -> bool {
        let url = self.url(HEALTH_PATH);
        match self.client.get(&url).send().await {
            Ok(resp) => {
                debug!(status = %resp.status(), "Health check response");
                resp.status().is_success()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl BundleSource for ApiClient {
    async fn fetch_bundle(&self) -> Result<BundlePayload> {
        self.fetch_user_bundle().await
    }
}
