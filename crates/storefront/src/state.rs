//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::postcode::{LookupError, PostcodeClient, SearchTracker};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("backend API client: {0}")]
    Api(#[from] ApiError),
    #[error("postcode client: {0}")]
    Postcode(#[from] LookupError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend client, the postcode client, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    postcode: PostcodeClient,
    searches: SearchTracker,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, AppStateError> {
        let api = ApiClient::new(&config)?;
        let postcode = PostcodeClient::new(&config)?;
        Ok(Self::from_parts(config, api, postcode))
    }

    /// Assemble state from already-built clients.
    #[must_use]
    pub fn from_parts(config: StorefrontConfig, api: ApiClient, postcode: PostcodeClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                postcode,
                searches: SearchTracker::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the postcode lookup client.
    #[must_use]
    pub fn postcode(&self) -> &PostcodeClient {
        &self.inner.postcode
    }

    /// Get the postcode search generation tracker.
    #[must_use]
    pub fn searches(&self) -> &SearchTracker {
        &self.inner.searches
    }
}
