//! Authentication and profile endpoints.

use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError, AuthResponse, LoginRequest, RegisterRequest, UserProfile};

impl ApiClient {
    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or another
    /// error if the request fails.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.execute(
            self.request(Method::POST, "/auth/login", None)
                .json(request),
        )
        .await
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.execute(
            self.request(Method::POST, "/auth/register", None)
                .json(request),
        )
        .await
    }

    /// Fetch the profile behind a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is rejected.
    #[instrument(skip_all)]
    pub async fn get_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.execute(self.request(Method::GET, "/user/profile", Some(token)))
            .await
    }
}
