//! Session-related types.
//!
//! Types stored in the session for authentication and UI state.

use serde::{Deserialize, Serialize};

use highstreet_core::UserId;

use crate::api::{AuthResponse, UserProfile};

/// Session-stored user identity.
///
/// Holds the backend bearer token so it never reaches the browser.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Whether the user may open the back-office.
    pub is_admin: bool,
    /// Contact phone, if given at registration.
    pub phone: Option<String>,
    /// Backend bearer token.
    pub token: String,
}

impl CurrentUser {
    /// Combine a login response with the profile it unlocked.
    ///
    /// The profile is authoritative; the login response only fills the
    /// admin flag when the profile does not carry one.
    #[must_use]
    pub fn from_login(token: String, auth: &AuthResponse, profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.display_name(),
            email: profile.email.clone(),
            is_admin: profile.is_admin || auth.is_admin,
            phone: profile.phone.clone().filter(|p| !p.trim().is_empty()),
            token,
        }
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("is_admin", &self.is_admin)
            .field("phone", &self.phone)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

impl FlashKind {
    /// CSS class suffix.
    #[must_use]
    pub const fn css(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "danger",
        }
    }
}

/// A one-shot notification shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for pending flash notifications.
    pub const FLASH: &str = "flash";

    /// Key for the in-progress checkout.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the postcode search scope used by the search tracker.
    pub const SEARCH_SCOPE: &str = "search_scope";

    /// Key for the postcode suggestions shown on the account address form.
    pub const ADDRESS_SUGGESTIONS: &str = "address_suggestions";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let user = CurrentUser {
            id: UserId::new("u1"),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            is_admin: false,
            phone: None,
            token: "eyJhbGciOiJIUzI1NiJ9.secret".to_string(),
        };

        let debug_output = format!("{user:?}");
        assert!(debug_output.contains("ada@example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("eyJhbGciOiJIUzI1NiJ9"));
    }

    #[test]
    fn test_from_login_merges_admin_flag() {
        let auth: AuthResponse =
            serde_json::from_value(json!({ "token": "t", "userId": "u1", "isAdmin": true }))
                .unwrap();
        let profile: UserProfile = serde_json::from_value(json!({
            "_id": "u1",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "phone": ""
        }))
        .unwrap();

        let user = CurrentUser::from_login("t".to_string(), &auth, &profile);
        assert!(user.is_admin);
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.phone, None);
    }
}
