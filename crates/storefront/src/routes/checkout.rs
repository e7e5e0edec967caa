//! Checkout route handlers.
//!
//! The [`CheckoutDraft`] lives in the session. Full-page posts follow
//! post/redirect/get back to `/checkout`, which renders whichever step the
//! draft is on; the postcode lookup and the saved/new toggle are HTMX
//! fragments.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use highstreet_core::AddressId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{Address, ShippingAddress};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{RequireAuth, push_flash};
use crate::models::{CurrentUser, Flash, session_keys};
use crate::routes::address_form::{
    self, AddressFieldsTemplate, AddressForm, AddressFormView, PostcodeResultsTemplate,
    SearchOutcome,
};
use crate::routes::cart::CartView;
use crate::routes::{Chrome, session_expired};
use crate::services::checkout::AddressChoice;
use crate::services::{
    AddressBook, Cart, CartService, CheckoutDraft, CheckoutError, CheckoutService, CheckoutStep,
    OrderSummary,
};
use crate::state::AppState;

const LOOKUP_BASE: &str = "/checkout";

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_draft(session: &Session) -> Option<CheckoutDraft> {
    session
        .get::<CheckoutDraft>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten()
}

async fn save_draft(session: &Session, draft: &CheckoutDraft) {
    if let Err(e) = session.insert(session_keys::CHECKOUT, draft).await {
        tracing::error!(error = %e, "Failed to store checkout draft");
    }
}

async fn drop_draft(session: &Session) {
    if let Err(e) = session
        .remove::<CheckoutDraft>(session_keys::CHECKOUT)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear checkout draft");
    }
}

/// The draft, or a fresh one when the session has none.
async fn current_draft(session: &Session, user: &CurrentUser) -> CheckoutDraft {
    match load_draft(session).await {
        Some(draft) => draft,
        None => CheckoutDraft::start(None, user),
    }
}

/// Saved addresses; `None` when they could not be loaded.
async fn saved_addresses(state: &AppState, user: &CurrentUser) -> Result<Option<Vec<Address>>, Response> {
    match AddressBook::new(state.api(), &user.token).list().await {
        Ok(addresses) => Ok(Some(addresses)),
        Err(e) if e.is_unauthorized() => Err(session_expired()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load saved addresses");
            Ok(None)
        }
    }
}

fn form_view(draft: &CheckoutDraft) -> AddressFormView {
    AddressFormView {
        address: draft.new_address.clone(),
        errors: draft.errors.clone(),
        postcode_query: draft.postcode_query.clone(),
        suggestions: draft.suggestions.clone(),
        lookup_error: draft.lookup_error.clone(),
        lookup_base: LOOKUP_BASE,
        show_default: false,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Address step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/address.html")]
pub struct CheckoutAddressTemplate {
    pub chrome: Chrome,
    pub cart: CartView,
    pub saved: Vec<Address>,
    /// The selected saved address ID, empty when entering a new one.
    pub selected_id: String,
    pub show_new: bool,
    pub address_error: Option<String>,
    pub form: AddressFormView,
}

/// Review step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/review.html")]
pub struct CheckoutReviewTemplate {
    pub chrome: Chrome,
    pub cart: CartView,
    pub address: ShippingAddress,
    pub summary: OrderSummary,
    pub processing: bool,
}

/// New address section fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_new_address.html")]
pub struct NewAddressSectionTemplate {
    pub show_new: bool,
    pub form: AddressFormView,
}

/// Saved/new address toggle form data.
#[derive(Debug, Deserialize)]
pub struct ChoiceForm {
    pub choice: String,
}

fn apply_choice(draft: &mut CheckoutDraft, choice: &str) {
    match choice.trim() {
        "" => {}
        "new" => draft.choose_new(),
        id => draft.choose_saved(AddressId::new(id)),
    }
}

// =============================================================================
// Pages
// =============================================================================

/// Display the current checkout step.
///
/// An empty cart sends the shopper back to `/cart`.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let cart = match CartService::new(state.api(), &user.token).fetch().await {
        Ok(cart) => cart,
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load cart for checkout");
            push_flash(&session, Flash::error(e.user_message("Failed to load cart"))).await;
            return Redirect::to("/cart").into_response();
        }
    };
    if cart.is_empty() {
        push_flash(&session, Flash::info("Your cart is empty")).await;
        return Redirect::to("/cart").into_response();
    }

    let saved = match saved_addresses(&state, &user).await {
        Ok(saved) => saved,
        Err(response) => return response,
    };

    let mut draft = match load_draft(&session).await {
        Some(mut draft) => {
            draft.reconcile(saved.as_deref());
            draft
        }
        None => CheckoutDraft::start(saved.as_deref(), &user),
    };
    draft.expire_stale_submission(Utc::now());
    save_draft(&session, &draft).await;

    let saved = saved.unwrap_or_default();
    let chrome = Chrome::new(&session, Some(user)).await;

    match draft.step {
        CheckoutStep::Address => render_address_step(chrome, &cart, saved, &draft),
        CheckoutStep::Review => {
            let Some(address) = draft.shipping_address(&saved) else {
                draft.back();
                save_draft(&session, &draft).await;
                return render_address_step(chrome, &cart, saved, &draft);
            };
            CheckoutReviewTemplate {
                chrome,
                cart: CartView::from(&cart),
                address,
                summary: OrderSummary::new(&cart, state.config().shipping_fee),
                processing: draft.processing,
            }
            .into_response()
        }
    }
}

fn render_address_step(
    chrome: Chrome,
    cart: &Cart,
    saved: Vec<Address>,
    draft: &CheckoutDraft,
) -> Response {
    let selected_id = match &draft.choice {
        AddressChoice::Saved(id) => id.to_string(),
        AddressChoice::New => String::new(),
    };
    CheckoutAddressTemplate {
        chrome,
        cart: CartView::from(cart),
        saved,
        selected_id,
        show_new: draft.uses_new_address(),
        address_error: draft.errors.get("address").map(str::to_string),
        form: form_view(draft),
    }
    .into_response()
}

/// Submit the address step.
///
/// Validation failures stay on the address step with per-field errors.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn submit_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let saved = match saved_addresses(&state, &user).await {
        Ok(saved) => saved.unwrap_or_default(),
        Err(response) => return response,
    };

    let mut draft = current_draft(&session, &user).await;
    apply_choice(&mut draft, &form.choice);
    if draft.uses_new_address() {
        draft.update_new_address(form.input());
    }

    if draft.submit_address(&saved).is_err() {
        push_flash(&session, Flash::error("Please fix address errors")).await;
    }
    save_draft(&session, &draft).await;
    Redirect::to("/checkout").into_response()
}

/// Return to the address step from review.
pub async fn back(session: Session, RequireAuth(user): RequireAuth) -> Response {
    let mut draft = current_draft(&session, &user).await;
    draft.back();
    save_draft(&session, &draft).await;
    Redirect::to("/checkout").into_response()
}

/// Place the order and hand over to the hosted payment page.
///
/// The draft is marked as processing (and the session saved) before the
/// backend is called, so a double submit is refused. Any failure clears the
/// mark and returns to review with a notification.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let Some(mut draft) = load_draft(&session).await else {
        return Redirect::to("/checkout").into_response();
    };

    if let Err(e) = draft.begin_submission() {
        push_flash(&session, Flash::info(e.user_message())).await;
        return Redirect::to("/checkout").into_response();
    }
    save_draft(&session, &draft).await;
    if let Err(e) = session.save().await {
        tracing::warn!(error = %e, "Failed to persist checkout guard");
    }

    let cart = match CartService::new(state.api(), &user.token).fetch().await {
        Ok(cart) => cart,
        Err(e) => {
            draft.finish_submission();
            save_draft(&session, &draft).await;
            if e.is_unauthorized() {
                return session_expired();
            }
            push_flash(&session, Flash::error(e.user_message("Failed to place order"))).await;
            return Redirect::to("/checkout").into_response();
        }
    };
    let saved = match saved_addresses(&state, &user).await {
        Ok(saved) => saved.unwrap_or_default(),
        Err(response) => {
            draft.finish_submission();
            save_draft(&session, &draft).await;
            return response;
        }
    };

    let service = CheckoutService::new(state.api(), &user, state.config().shipping_fee);
    match service.place_order(&mut draft, &cart, &saved).await {
        Ok(checkout_url) => {
            add_breadcrumb("checkout", "Order placed", None);
            drop_draft(&session).await;
            Redirect::to(&checkout_url).into_response()
        }
        Err(e) => {
            save_draft(&session, &draft).await;
            if e.is_unauthorized() {
                return session_expired();
            }
            push_flash(&session, Flash::error(e.user_message())).await;
            let target = if matches!(e, CheckoutError::EmptyCart) {
                "/cart"
            } else {
                "/checkout"
            };
            Redirect::to(target).into_response()
        }
    }
}

// =============================================================================
// HTMX Fragments
// =============================================================================

/// Switch between a saved address and the new-address form (HTMX).
pub async fn choose_address(
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ChoiceForm>,
) -> Response {
    let mut draft = current_draft(&session, &user).await;
    apply_choice(&mut draft, &form.choice);
    save_draft(&session, &draft).await;

    NewAddressSectionTemplate {
        show_new: draft.uses_new_address(),
        form: form_view(&draft),
    }
    .into_response()
}

/// Search for addresses by postcode (HTMX).
///
/// The typed address fields are kept in the draft so the search does not
/// lose them.
#[instrument(skip(state, session, user, form), fields(query = %form.postcode_query))]
pub async fn search_postcode(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let result = match address_form::search(&state, &session, "checkout", &form.postcode_query).await
    {
        SearchOutcome::Done(result) => result,
        SearchOutcome::Superseded => return address_form::superseded(),
    };

    let mut draft = current_draft(&session, &user).await;
    draft.update_new_address(form.input());
    draft.set_suggestions(&form.postcode_query, result);
    save_draft(&session, &draft).await;

    PostcodeResultsTemplate {
        suggestions: draft.suggestions,
        lookup_error: draft.lookup_error,
        lookup_base: LOOKUP_BASE,
    }
    .into_response()
}

/// Accept a postcode suggestion (HTMX). Re-renders the address fields.
pub async fn select_suggestion(
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let mut draft = current_draft(&session, &user).await;
    draft.update_new_address(form.input());
    if !draft.select_suggestion(&form.suggestion) {
        draft.lookup_error = Some("That suggestion has expired. Please search again.".to_string());
    }
    save_draft(&session, &draft).await;

    AddressFieldsTemplate {
        form: form_view(&draft),
    }
    .into_response()
}

/// Skip the suggestions and type the address (HTMX).
pub async fn manual_entry(
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Response {
    let mut draft = current_draft(&session, &user).await;
    draft.update_new_address(form.input());
    if !form.postcode_query.trim().is_empty() {
        draft.postcode_query.clone_from(&form.postcode_query);
    }
    draft.manual_entry();
    save_draft(&session, &draft).await;

    AddressFieldsTemplate {
        form: form_view(&draft),
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            is_admin: false,
            phone: None,
            token: "t".to_string(),
        }
    }

    #[test]
    fn test_apply_choice() {
        let mut draft = CheckoutDraft::start(None, &user());
        assert!(draft.uses_new_address());

        apply_choice(&mut draft, "a1");
        assert_eq!(draft.choice, AddressChoice::Saved(AddressId::new("a1")));

        apply_choice(&mut draft, "  ");
        assert_eq!(draft.choice, AddressChoice::Saved(AddressId::new("a1")));

        apply_choice(&mut draft, "new");
        assert!(draft.uses_new_address());
    }

    #[test]
    fn test_form_view_carries_draft_state() {
        let mut draft = CheckoutDraft::start(None, &user());
        draft.set_suggestions("XX1", Err("Please enter a valid UK postcode".to_string()));
        let view = form_view(&draft);
        assert_eq!(view.address.name, "Ada Lovelace");
        assert_eq!(view.postcode_query, "XX1");
        assert_eq!(
            view.lookup_error.as_deref(),
            Some("Please enter a valid UK postcode")
        );
        assert_eq!(view.lookup_base, "/checkout");
    }
}
