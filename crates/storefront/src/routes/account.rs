//! Account route handlers: profile, order history, address book.
//!
//! These routes require authentication. Address forms share the fields
//! partial and postcode lookup with checkout; suggestions for the form in
//! progress are kept in the session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use highstreet_core::{AddressId, AddressInput, FieldErrors};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{Address, ApiError, Order};
use crate::filters;
use crate::middleware::{RequireAuth, push_flash};
use crate::models::{CurrentUser, Flash, session_keys};
use crate::postcode::{AddressSuggestion, display_postcode};
use crate::routes::address_form::{
    self, AddressFieldsTemplate, AddressForm, AddressFormView, PostcodeResultsTemplate,
    SearchOutcome,
};
use crate::routes::{Chrome, Pager, session_expired};
use crate::services::addresses::can_delete;
use crate::services::orders::USER_ORDERS_PER_PAGE;
use crate::services::{AddressBook, AddressError};
use crate::state::AppState;

const LOOKUP_BASE: &str = "/account";

/// Profile display data for templates.
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub member_since: String,
}

impl From<&CurrentUser> for ProfileView {
    fn from(user: &CurrentUser) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            member_since: "-".to_string(),
        }
    }
}

/// A saved address with its delete guard.
pub struct AddressCard {
    pub address: Address,
    pub deletable: bool,
}

fn address_cards(addresses: Vec<Address>) -> Vec<AddressCard> {
    let flags: Vec<bool> = addresses
        .iter()
        .map(|a| can_delete(a, &addresses))
        .collect();
    addresses
        .into_iter()
        .zip(flags)
        .map(|(address, deletable)| AddressCard { address, deletable })
        .collect()
}

/// Postcode suggestions for the address form in progress.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PendingLookup {
    query: String,
    suggestions: Vec<AddressSuggestion>,
}

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    pub page: Option<u32>,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub chrome: Chrome,
    pub profile: ProfileView,
    pub orders: Vec<Order>,
    pub orders_error: Option<String>,
    pub pager: Pager,
    pub addresses: Vec<AddressCard>,
    pub addresses_error: Option<String>,
}

/// New/edit address page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/address_form.html")]
pub struct AddressPageTemplate {
    pub chrome: Chrome,
    pub title: &'static str,
    /// Form action URL.
    pub action: String,
    pub form: AddressFormView,
}

fn form_view(address: AddressInput, errors: FieldErrors) -> AddressFormView {
    AddressFormView {
        errors,
        show_default: true,
        ..AddressFormView::new(address, LOOKUP_BASE)
    }
}

/// Display the account overview.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<AccountQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let book = AddressBook::new(state.api(), &user.token);

    let (profile, orders, addresses) = tokio::join!(
        state.api().get_profile(&user.token),
        state
            .api()
            .get_user_orders(&user.token, page, USER_ORDERS_PER_PAGE),
        book.list(),
    );

    let profile = match profile {
        Ok(profile) => ProfileView {
            name: profile.display_name(),
            email: profile.email.clone(),
            phone: profile.phone.clone().unwrap_or_default(),
            member_since: profile.member_since(),
        },
        Err(ApiError::Unauthorized) => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load profile, using session copy");
            ProfileView::from(&user)
        }
    };

    let (orders, total_pages, orders_error) = match orders {
        Ok(p) => (p.orders, p.total_pages, None),
        Err(ApiError::Unauthorized) => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load order history");
            (Vec::new(), 1, Some(e.user_message("Failed to load orders")))
        }
    };

    let (addresses, addresses_error) = match addresses {
        Ok(list) => (address_cards(list), None),
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load addresses");
            (Vec::new(), Some(e.user_message("Failed to load addresses")))
        }
    };

    AccountIndexTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        profile,
        orders,
        orders_error,
        pager: Pager::new(page, total_pages, "/account", &[]),
        addresses,
        addresses_error,
    }
    .into_response()
}

// =============================================================================
// Address Book
// =============================================================================

/// New address form.
pub async fn new_address(session: Session, RequireAuth(user): RequireAuth) -> impl IntoResponse {
    forget_lookup(&session).await;
    let address = AddressInput {
        name: user.name.clone(),
        phone: user.phone.clone().unwrap_or_default(),
        ..AddressInput::default()
    };
    AddressPageTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        title: "Add Address",
        action: "/account/addresses".to_string(),
        form: form_view(address, FieldErrors::new()),
    }
}

/// Create an address.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let input = form.input();
    let result = AddressBook::new(state.api(), &user.token)
        .create(&input)
        .await;
    finish_save(
        session,
        user,
        result,
        input,
        "Add Address",
        "/account/addresses".to_string(),
        "Address added",
    )
    .await
}

/// Edit address form.
#[instrument(skip(state, session, user), fields(user_id = %user.id, address_id = %id))]
pub async fn edit_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Response {
    let address = match AddressBook::new(state.api(), &user.token).get(&id).await {
        Ok(address) => address,
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            push_flash(&session, Flash::error(e.user_message("Failed to load address"))).await;
            return Redirect::to("/account").into_response();
        }
    };
    forget_lookup(&session).await;

    AddressPageTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        title: "Edit Address",
        action: format!("/account/addresses/{id}"),
        form: form_view(address.to_input(), FieldErrors::new()),
    }
    .into_response()
}

/// Update an address.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id, address_id = %id))]
pub async fn update_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Form(form): Form<AddressForm>,
) -> Response {
    let input = form.input();
    let result = AddressBook::new(state.api(), &user.token)
        .update(&id, &input)
        .await;
    finish_save(
        session,
        user,
        result,
        input,
        "Edit Address",
        format!("/account/addresses/{id}"),
        "Address updated",
    )
    .await
}

/// Redirect after a successful save, or re-render the form.
async fn finish_save(
    session: Session,
    user: CurrentUser,
    result: Result<Vec<Address>, AddressError>,
    input: AddressInput,
    title: &'static str,
    action: String,
    done: &str,
) -> Response {
    let errors = match result {
        Ok(_) => {
            forget_lookup(&session).await;
            push_flash(&session, Flash::success(done)).await;
            return Redirect::to("/account").into_response();
        }
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(AddressError::Validation(errors)) => errors,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to save address");
            push_flash(&session, Flash::error(e.user_message("Failed to save address"))).await;
            FieldErrors::new()
        }
    };

    AddressPageTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        title,
        action,
        form: form_view(input, errors),
    }
    .into_response()
}

/// Delete an address.
#[instrument(skip(state, session, user), fields(user_id = %user.id, address_id = %id))]
pub async fn delete_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Response {
    match AddressBook::new(state.api(), &user.token).delete(&id).await {
        Ok(_) => push_flash(&session, Flash::success("Address deleted")).await,
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to delete address");
            push_flash(&session, Flash::error(e.user_message("Failed to delete address"))).await;
        }
    }
    Redirect::to("/account").into_response()
}

/// Make an address the default.
#[instrument(skip(state, session, user), fields(user_id = %user.id, address_id = %id))]
pub async fn set_default_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Response {
    match AddressBook::new(state.api(), &user.token)
        .set_default(&id)
        .await
    {
        Ok(_) => push_flash(&session, Flash::success("Default address updated")).await,
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to set default address");
            push_flash(
                &session,
                Flash::error(e.user_message("Failed to set default address")),
            )
            .await;
        }
    }
    Redirect::to("/account").into_response()
}

// =============================================================================
// Postcode Lookup (HTMX)
// =============================================================================

async fn pending_lookup(session: &Session) -> PendingLookup {
    session
        .get::<PendingLookup>(session_keys::ADDRESS_SUGGESTIONS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

async fn forget_lookup(session: &Session) {
    if let Err(e) = session
        .remove::<PendingLookup>(session_keys::ADDRESS_SUGGESTIONS)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear postcode suggestions");
    }
}

/// Search for addresses by postcode.
#[instrument(skip(state, session, _user, form), fields(query = %form.postcode_query))]
pub async fn search_postcode(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let result = match address_form::search(&state, &session, "account", &form.postcode_query).await
    {
        SearchOutcome::Done(result) => result,
        SearchOutcome::Superseded => return address_form::superseded(),
    };

    let (suggestions, lookup_error) = match result {
        Ok(suggestions) => (suggestions, None),
        Err(message) => (Vec::new(), Some(message)),
    };
    let pending = PendingLookup {
        query: form.postcode_query.trim().to_string(),
        suggestions,
    };
    if let Err(e) = session
        .insert(session_keys::ADDRESS_SUGGESTIONS, &pending)
        .await
    {
        tracing::warn!(error = %e, "Failed to store postcode suggestions");
    }

    PostcodeResultsTemplate {
        suggestions: pending.suggestions,
        lookup_error,
        lookup_base: LOOKUP_BASE,
    }
    .into_response()
}

/// Accept a suggestion; re-renders the address fields.
pub async fn select_suggestion(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let pending = pending_lookup(&session).await;
    let mut address = form.input();
    let mut view_error = None;

    match pending
        .suggestions
        .iter()
        .find(|s| s.id == form.suggestion)
    {
        Some(suggestion) => {
            suggestion.apply_to(&mut address, &pending.query);
            forget_lookup(&session).await;
        }
        None => {
            view_error = Some("That suggestion has expired. Please search again.".to_string());
        }
    }

    let mut view = form_view(address, FieldErrors::new());
    view.postcode_query = pending.query;
    view.lookup_error = view_error;
    AddressFieldsTemplate { form: view }.into_response()
}

/// Skip the suggestions and type the address.
pub async fn manual_entry(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let pending = pending_lookup(&session).await;
    let query = if form.postcode_query.trim().is_empty() {
        pending.query
    } else {
        form.postcode_query.trim().to_string()
    };
    forget_lookup(&session).await;

    let mut address = form.input();
    address.clear_for_manual_entry(&display_postcode(&query));

    let mut view = form_view(address, FieldErrors::new());
    view.postcode_query = query;
    AddressFieldsTemplate { form: view }.into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_address_cards_guard_default() {
        let addresses: Vec<Address> = serde_json::from_value(json!([
            { "_id": "a1", "isDefault": true },
            { "_id": "a2", "isDefault": false }
        ]))
        .unwrap();

        let cards = address_cards(addresses);
        assert!(!cards[0].deletable);
        assert!(cards[1].deletable);
    }

    #[test]
    fn test_profile_fallback_from_session() {
        let user = CurrentUser {
            id: "u1".into(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            is_admin: false,
            phone: None,
            token: "t".to_string(),
        };
        let profile = ProfileView::from(&user);
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.phone, "");
        assert_eq!(profile.member_since, "-");
    }

    #[test]
    fn test_form_view_shows_default_checkbox() {
        let view = form_view(AddressInput::default(), FieldErrors::new());
        assert!(view.show_default);
        assert_eq!(view.lookup_base, "/account");
    }
}
