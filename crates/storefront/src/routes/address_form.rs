//! The address form shared by checkout and the account address book.
//!
//! Both flows render the same fields partial and the same postcode lookup:
//! search, pick a suggestion or enter manually. Searches are numbered per
//! session and form; a search that finishes after a newer one started is
//! dropped and its response swaps nothing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Response},
};
use highstreet_core::{AddressInput, DEFAULT_COUNTRY, FieldErrors};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::models::session_keys;
use crate::postcode::AddressSuggestion;
use crate::state::AppState;

/// Address form data as posted by the browser.
///
/// Kept flat (no nested `AddressInput`) so the checkbox and the lookup
/// fields decode straight from the urlencoded body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressForm {
    pub name: String,
    pub phone: String,
    pub house_number: String,
    pub street: String,
    pub city: String,
    pub county: String,
    pub postcode: String,
    pub country: String,
    pub is_default: Option<String>,
    /// Text typed into the postcode search box.
    pub postcode_query: String,
    /// Suggestion picked from the search results.
    pub suggestion: String,
    /// Checkout only: `new` or a saved address ID.
    pub choice: String,
}

impl AddressForm {
    /// The address fields, with a blank country defaulted.
    #[must_use]
    pub fn input(&self) -> AddressInput {
        let country = self.country.trim();
        AddressInput {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            house_number: self.house_number.trim().to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            county: self.county.trim().to_string(),
            postcode: self.postcode.trim().to_string(),
            country: if country.is_empty() {
                DEFAULT_COUNTRY.to_string()
            } else {
                country.to_string()
            },
            is_default: self.is_default.is_some(),
        }
    }
}

/// Everything the fields partial needs.
pub struct AddressFormView {
    pub address: AddressInput,
    pub errors: FieldErrors,
    pub postcode_query: String,
    pub suggestions: Vec<AddressSuggestion>,
    pub lookup_error: Option<String>,
    /// Route prefix for the lookup endpoints, `/checkout` or `/account`.
    pub lookup_base: &'static str,
    /// Whether to show the "make default" checkbox.
    pub show_default: bool,
}

impl AddressFormView {
    #[must_use]
    pub fn new(address: AddressInput, lookup_base: &'static str) -> Self {
        Self {
            address,
            errors: FieldErrors::new(),
            postcode_query: String::new(),
            suggestions: Vec::new(),
            lookup_error: None,
            lookup_base,
            show_default: false,
        }
    }

    /// The error message for a field, or an empty string.
    #[must_use]
    pub fn error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

/// Address fields fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/address_fields.html")]
pub struct AddressFieldsTemplate {
    pub form: AddressFormView,
}

/// Postcode search results fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/postcode_results.html")]
pub struct PostcodeResultsTemplate {
    pub suggestions: Vec<AddressSuggestion>,
    pub lookup_error: Option<String>,
    pub lookup_base: &'static str,
}

/// Outcome of a postcode search.
pub enum SearchOutcome {
    /// Suggestions, or the message to show under the search box.
    Done(Result<Vec<AddressSuggestion>, String>),
    /// A newer search from the same form started meanwhile.
    Superseded,
}

/// Run a postcode search for one form of this session.
///
/// Invalid postcodes fail locally without a request.
#[instrument(skip(state, session, query))]
pub async fn search(
    state: &AppState,
    session: &Session,
    form: &str,
    query: &str,
) -> SearchOutcome {
    let scope = format!("{}:{form}", search_scope(session).await);
    let generation = state.searches().begin(&scope).await;

    let result = state.postcode().suggest(query).await.map_err(|e| {
        tracing::debug!(error = %e, "Postcode search failed");
        e.user_message()
    });

    if state.searches().is_current(&scope, generation).await {
        SearchOutcome::Done(result)
    } else {
        tracing::debug!(generation, "Discarding superseded postcode search");
        SearchOutcome::Superseded
    }
}

/// Response for a superseded search: nothing to swap.
#[must_use]
pub fn superseded() -> Response {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([("HX-Reswap", "none")]),
    )
        .into_response()
}

/// Stable per-session key for the search tracker.
///
/// The session ID changes at login, so a random scope is kept in the session
/// instead.
async fn search_scope(session: &Session) -> String {
    if let Ok(Some(scope)) = session.get::<String>(session_keys::SEARCH_SCOPE).await {
        return scope;
    }
    let scope = uuid::Uuid::new_v4().to_string();
    if let Err(e) = session.insert(session_keys::SEARCH_SCOPE, &scope).await {
        tracing::warn!(error = %e, "Failed to store search scope");
    }
    scope
}
