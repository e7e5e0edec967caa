//! Login and registration.
//!
//! Credentials are checked locally first so obviously bad input never
//! reaches the backend. A successful login always ends with a profile fetch:
//! the session identity is built from the profile, not from the login
//! response alone.

use highstreet_core::{Email, FieldErrors, UkPhone};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::{ApiClient, ApiError, AuthResponse, LoginRequest, RegisterRequest};
use crate::models::CurrentUser;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more form fields failed local validation.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The backend rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The backend accepted the login but sent no token.
    #[error("login response did not include a token")]
    MissingToken,

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Message for the flash notification.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::MissingToken => fallback.to_string(),
            Self::Api(e) => e.user_message(fallback),
        }
    }

    /// Field errors to show next to the inputs, if any.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::Validation(errors) => errors.clone(),
            _ => FieldErrors::new(),
        }
    }
}

/// Login form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Page to return to after login.
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    /// Check the form before calling the backend.
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Err(e) = Email::parse(&self.email) {
            errors.insert("email", email_message(&e));
        }
        if self.password.is_empty() {
            errors.insert("password", "Password is required");
        }
        errors
    }
}

/// Registration form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterForm {
    /// Check the form before calling the backend.
    ///
    /// The phone number is optional, but must be a UK mobile when given.
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.insert("name", "Name is required");
        }
        if let Err(e) = Email::parse(&self.email) {
            errors.insert("email", email_message(&e));
        }
        if !self.phone.trim().is_empty()
            && let Err(e) = UkPhone::parse(&self.phone)
        {
            errors.insert("phone", e.to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.insert(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }
        if self.password != self.confirm_password {
            errors.insert("confirm_password", "Passwords do not match");
        }

        errors
    }
}

fn email_message(error: &highstreet_core::EmailError) -> String {
    match error {
        highstreet_core::EmailError::Empty => "Email is required".to_string(),
        _ => "Please enter a valid email address".to_string(),
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Log in and load the profile that becomes the session identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for malformed input (no request is
    /// made), `AuthError::InvalidCredentials` when the backend rejects the
    /// password, or `AuthError::Api` for any other backend failure.
    #[instrument(skip(self, form), fields(email = %form.email.trim()))]
    pub async fn login(&self, form: &LoginForm) -> Result<CurrentUser, AuthError> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let request = LoginRequest {
            email: form.email.trim().to_string(),
            password: form.password.clone(),
        };
        let response = self.api.login(&request).await.map_err(|e| match e {
            ApiError::Unauthorized => AuthError::InvalidCredentials,
            other => AuthError::Api(other),
        })?;

        self.establish(response).await
    }

    /// Register a new account and log it in.
    ///
    /// When the registration response carries no token, the same
    /// credentials are used to log in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for malformed input (no request is
    /// made), or `AuthError::Api` if the backend refuses the registration.
    #[instrument(skip(self, form), fields(email = %form.email.trim()))]
    pub async fn register(&self, form: &RegisterForm) -> Result<CurrentUser, AuthError> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let phone = Some(form.phone.trim().to_string()).filter(|p| !p.is_empty());
        let request = RegisterRequest {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password.clone(),
            phone,
        };
        let response = self.api.register(&request).await?;

        if response.token.is_some() {
            return self.establish(response).await;
        }

        info!("Registration returned no token, logging in");
        let login = LoginForm {
            email: request.email,
            password: request.password,
            next: None,
        };
        self.login(&login).await
    }

    async fn establish(&self, response: AuthResponse) -> Result<CurrentUser, AuthError> {
        let token = response
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let profile = self.api.get_profile(&token).await?;
        Ok(CurrentUser::from_login(token, &response, &profile))
    }
}

/// Where to send the user after login.
///
/// Only local absolute paths are honoured; anything else falls back to `/`.
#[must_use]
pub fn safe_redirect(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.starts_with("/login") =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_validation() {
        let form = LoginForm {
            email: "not-an-email".to_string(),
            password: String::new(),
            next: None,
        };
        let errors = form.validate();
        assert_eq!(errors.get("email"), Some("Please enter a valid email address"));
        assert_eq!(errors.get("password"), Some("Password is required"));

        let ok = LoginForm {
            email: "shopper@example.co.uk".to_string(),
            password: "secret".to_string(),
            next: None,
        };
        assert!(ok.validate().is_empty());
    }

    #[test]
    fn test_register_validation() {
        let form = RegisterForm {
            name: " ".to_string(),
            email: String::new(),
            phone: "12345".to_string(),
            password: "abc".to_string(),
            confirm_password: "abd".to_string(),
        };
        let errors = form.validate();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
    }

    #[test]
    fn test_register_phone_is_optional() {
        let form = RegisterForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            password: "analytical".to_string(),
            confirm_password: "analytical".to_string(),
        };
        assert!(form.validate().is_empty());
    }

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/checkout")), "/checkout");
        assert_eq!(safe_redirect(Some("/orders/abc?x=1")), "/orders/abc?x=1");
        assert_eq!(safe_redirect(Some("https://evil.example")), "/");
        assert_eq!(safe_redirect(Some("//evil.example")), "/");
        assert_eq!(safe_redirect(Some("/\\evil.example")), "/");
        assert_eq!(safe_redirect(Some("/login")), "/");
        assert_eq!(safe_redirect(None), "/");
    }

    #[test]
    fn test_invalid_credentials_message() {
        assert_eq!(
            AuthError::InvalidCredentials.user_message("Login failed"),
            "Invalid email or password"
        );
    }
}
