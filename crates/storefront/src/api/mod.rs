//! Backend REST API client.
//!
//! # Architecture
//!
//! - JSON over HTTP with `reqwest`, `Authorization: Bearer` for user calls
//! - The backend is the source of truth: no local sync, every mutation is
//!   followed by an explicit refetch in the calling service
//! - Only the category list is cached (`moka`, 5 minute TTL, invalidated on
//!   every category mutation); products, carts, and orders are always fresh
//!
//! Endpoint groups live in their own modules as `impl ApiClient` blocks.
//!
//! # Example
//!
//! ```rust,ignore
//! use highstreet_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config)?;
//!
//! let page = client.get_products(&ProductQuery::default()).await?;
//! let cart = client.get_cart(&user.token).await?;
//! ```

mod addresses;
mod admin;
mod auth;
mod cart;
mod categories;
mod orders;
mod products;
pub mod types;

pub use admin::STATS_WINDOWS;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::StorefrontConfig;

/// Errors that can occur when calling the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The bearer token was missing, expired, or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Order was created but the backend sent no payment redirect.
    #[error("Order response did not include a checkout URL")]
    MissingCheckoutUrl,
}

impl ApiError {
    /// Message suitable for showing to the shopper.
    ///
    /// Backend validation messages are passed through; transport failures
    /// are replaced with a generic message.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api { status, message } if *status < 500 && !message.is_empty() => {
                message.clone()
            }
            Self::NotFound(message) if !message.is_empty() => message.clone(),
            Self::Unauthorized => "Please log in to continue".to_string(),
            Self::RateLimited(_) => "Too many requests, please try again shortly".to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Client for the backend REST API.
///
/// Cheaply cloneable; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, CacheValue>,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Vec<Category>),
}

impl ApiClient {
    /// Create a new backend API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        Self::with_base_url(&config.api_base_url, config.http_timeout)
    }

    /// Create a client for an explicit API root.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("highstreet-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Build a request for a path under the API root.
    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON response.
    ///
    /// Empty bodies decode as JSON `null`, so callers that ignore the body
    /// can use `serde::de::IgnoredAny`.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&response_text);
            return Err(match status {
                StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
                StatusCode::NOT_FOUND => ApiError::NotFound(message),
                _ => {
                    tracing::warn!(
                        status = %status,
                        body = %response_text.chars().take(500).collect::<String>(),
                        "Backend API returned non-success status"
                    );
                    ApiError::Api {
                        status: status.as_u16(),
                        message,
                    }
                }
            });
        }

        let body = if response_text.trim().is_empty() {
            "null"
        } else {
            response_text.as_str()
        };

        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse backend API response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Send a request whose response body is not needed.
    async fn execute_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute::<serde::de::IgnoredAny>(request).await?;
        Ok(())
    }

    /// Check that the backend answers at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or failing.
    pub async fn ping(&self) -> Result<(), ApiError> {
        debug!("Pinging backend API");
        self.execute_unit(self.request(Method::GET, "/categories", None))
            .await
    }
}

/// Percent-encode a single path segment.
fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Extract the human-readable message from a backend error body.
///
/// The backend reports failures as `{"error": "..."}` or `{"message": "..."}`.
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"Out of stock"}"#), "Out of stock");
        assert_eq!(error_message(r#"{"message":"Invalid token"}"#), "Invalid token");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_user_message_hides_server_failures() {
        let client_error = ApiError::Api {
            status: 400,
            message: "Email already registered".to_string(),
        };
        assert_eq!(client_error.user_message("fallback"), "Email already registered");

        let server_error = ApiError::Api {
            status: 500,
            message: "MongoServerError: connection reset".to_string(),
        };
        assert_eq!(server_error.user_message("Failed to load"), "Failed to load");
        assert_eq!(
            ApiError::MissingCheckoutUrl.user_message("Failed to place order"),
            "Failed to place order"
        );
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("650a1b2c"), "650a1b2c");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
