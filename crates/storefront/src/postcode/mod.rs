//! UK postcode lookup client (postcodes.io-compatible).
//!
//! Address search runs in three steps:
//! 1. The typed postcode is normalized and validated locally. Invalid input
//!    never reaches the network.
//! 2. The postcode itself is looked up to build the primary suggestion.
//! 3. Autocomplete candidates (at most [`MAX_CANDIDATES`]) are looked up
//!    concurrently to build extra suggestions. Any failure in this step only
//!    drops the affected suggestion.
//!
//! Primary lookups are cached for an hour; postcode boundaries do not move
//! within a session.

mod tracker;
pub mod types;

pub use tracker::SearchTracker;
pub use types::{AddressSuggestion, PostcodeResult};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use highstreet_core::Postcode;
use moka::future::Cache;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::StorefrontConfig;
use types::Envelope;

/// Upper bound on enrichment lookups per search.
pub const MAX_CANDIDATES: usize = 5;

/// The postcode to keep in the form after a search: formatted when valid,
/// otherwise as typed.
#[must_use]
pub fn display_postcode(raw: &str) -> String {
    Postcode::parse(raw).map_or_else(|_| raw.trim().to_string(), |p| p.formatted())
}

/// Errors from a postcode search.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The input is not a UK postcode; no request was made.
    #[error("Invalid postcode: {0}")]
    Invalid(#[from] highstreet_core::PostcodeError),

    /// The service does not know the postcode.
    #[error("Postcode not found: {0}")]
    NotFound(String),

    /// The service returned an unexpected status.
    #[error("Postcode service error: {0}")]
    Api(u16),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LookupError {
    /// Message shown next to the postcode field.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(e) => e.to_string(),
            Self::NotFound(_) => "Postcode not found".to_string(),
            Self::Api(_) => "Unable to find addresses for this postcode".to_string(),
            Self::Http(_) | Self::Parse(_) => {
                "Failed to fetch address. Please enter manually.".to_string()
            }
        }
    }
}

/// Client for the postcode lookup service.
#[derive(Clone)]
pub struct PostcodeClient {
    inner: Arc<PostcodeClientInner>,
}

struct PostcodeClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, PostcodeResult>,
}

impl PostcodeClient {
    /// Create a new postcode client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, LookupError> {
        Self::with_base_url(&config.postcode_api_url, config.http_timeout)
    }

    /// Create a client for an explicit service root.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600)) // 1 hour
            .build();

        Ok(Self {
            inner: Arc::new(PostcodeClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Search for address suggestions for raw user input.
    ///
    /// The input is validated before any request is made. The first
    /// suggestion is always the primary one for the postcode itself.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::Invalid` without a network call for malformed
    /// input, or an error if the primary lookup fails.
    #[instrument(skip(self))]
    pub async fn suggest(&self, raw: &str) -> Result<Vec<AddressSuggestion>, LookupError> {
        let postcode = Postcode::parse(raw)?;
        let primary = self.lookup(&postcode).await?;

        let mut suggestions = vec![AddressSuggestion::primary(&primary)];

        let candidates = match self.autocomplete(&postcode).await {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(error = %e, "Autocomplete failed, using primary only");
                Vec::new()
            }
        };

        let lookups = candidates
            .into_iter()
            .take(MAX_CANDIDATES)
            .map(|candidate| async move {
                let result = self.lookup_candidate(&candidate).await;
                (candidate, result)
            });

        for (index, (candidate, result)) in join_all(lookups).await.into_iter().enumerate() {
            match result {
                Ok(found) => suggestions.push(AddressSuggestion::candidate(
                    index, &candidate, &found, &primary,
                )),
                Err(e) => debug!(candidate = %candidate, error = %e, "Dropping candidate"),
            }
        }

        Ok(suggestions)
    }

    /// Look up a single postcode.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::NotFound` for unknown postcodes, or another
    /// error if the request fails.
    #[instrument(skip(self), fields(postcode = %postcode.as_str()))]
    pub async fn lookup(&self, postcode: &Postcode) -> Result<PostcodeResult, LookupError> {
        let key = postcode.as_str().to_string();

        if let Some(result) = self.inner.cache.get(&key).await {
            debug!("Cache hit for postcode");
            return Ok(result);
        }

        let path = format!("/postcodes/{}", urlencoding::encode(&key));
        let envelope: Envelope<PostcodeResult> = self.get(&path, &key).await?;

        let result = match envelope {
            Envelope {
                status: 200,
                result: Some(result),
            } => result,
            _ => return Err(LookupError::NotFound(key)),
        };

        self.inner.cache.insert(key, result.clone()).await;
        Ok(result)
    }

    /// Postcodes sharing a prefix with `postcode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(postcode = %postcode.as_str()))]
    pub async fn autocomplete(&self, postcode: &Postcode) -> Result<Vec<String>, LookupError> {
        let path = format!(
            "/postcodes/{}/autocomplete",
            urlencoding::encode(postcode.as_str())
        );
        let envelope: Envelope<Vec<String>> = self.get(&path, postcode.as_str()).await?;
        Ok(envelope.result.unwrap_or_default())
    }

    async fn lookup_candidate(&self, candidate: &str) -> Result<PostcodeResult, LookupError> {
        let postcode = Postcode::parse(candidate)?;
        self.lookup(&postcode).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, postcode: &str) -> Result<T, LookupError> {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(postcode.to_string()));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Postcode service returned non-success status"
            );
            return Err(LookupError::Api(status.as_u16()));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse postcode service response"
            );
            LookupError::Parse(e.to_string())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use highstreet_core::PostcodeError;

    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            LookupError::Invalid(PostcodeError::Invalid).user_message(),
            "Please enter a valid UK postcode"
        );
        assert_eq!(
            LookupError::NotFound("ZZ11ZZ".to_string()).user_message(),
            "Postcode not found"
        );
        assert_eq!(
            LookupError::Api(500).user_message(),
            "Unable to find addresses for this postcode"
        );
    }

    #[test]
    fn test_display_postcode() {
        assert_eq!(display_postcode("sw1a1aa"), "SW1A 1AA");
        assert_eq!(display_postcode(" nope "), "nope");
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_request() {
        // Nothing listens on port 9; reaching the network would be an Http error.
        let client =
            PostcodeClient::with_base_url("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.suggest("NOT A POSTCODE").await.unwrap_err();
        assert!(matches!(err, LookupError::Invalid(_)));
    }
}
