//! Checkout: address step, review step, order placement.
//!
//! The draft lives in the session between requests. It moves
//! `Address -> Review` once a shipping address is resolved, and placing the
//! order hands the shopper to the hosted payment page.
//!
//! ```text
//!  Address ──submit_address──▶ Review ──place_order──▶ payment redirect
//!     ▲                          │
//!     └─────────── back ─────────┘
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use highstreet_core::{AddressId, AddressInput, FieldErrors, PaymentMethod, Price};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{
    Address, AddressPayload, ApiClient, ApiError, CreateOrderRequest, OrderItem, ShippingAddress,
};
use crate::models::CurrentUser;
use crate::postcode::{AddressSuggestion, display_postcode};
use crate::services::cart::Cart;

/// How long a submission mark blocks a retry. A request that was dropped
/// mid-flight leaves its mark behind; after this it no longer counts.
const SUBMISSION_TIMEOUT_SECS: i64 = 120;

/// Which checkout step the shopper is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    #[default]
    Address,
    Review,
}

/// The shipping address the shopper picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AddressChoice {
    Saved(AddressId),
    New,
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// A submission for this draft is already running.
    #[error("order placement already in progress")]
    InProgress,

    /// The shipping address is missing or invalid.
    #[error("address validation failed: {0}")]
    Validation(FieldErrors),

    /// Backend call failed, including a missing payment redirect.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// Whether the backend rejected the session token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }

    /// Message for the flash notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => "Your cart is empty".to_string(),
            Self::InProgress => "Your order is already being placed".to_string(),
            Self::Validation(_) => "Please fix address errors".to_string(),
            Self::Api(e) => e.user_message("Failed to place order"),
        }
    }
}

/// In-progress checkout, stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub step: CheckoutStep,
    pub choice: AddressChoice,
    /// New address form contents.
    pub new_address: AddressInput,
    /// Last postcode typed into the lookup box.
    #[serde(default)]
    pub postcode_query: String,
    #[serde(default)]
    pub suggestions: Vec<AddressSuggestion>,
    /// Message shown under the lookup box.
    #[serde(default)]
    pub lookup_error: Option<String>,
    #[serde(default)]
    pub errors: FieldErrors,
    /// Set while an order submission is in flight.
    #[serde(default)]
    pub processing: bool,
    /// When the in-flight submission started.
    #[serde(default)]
    pub processing_since: Option<DateTime<Utc>>,
}

impl CheckoutDraft {
    /// Start a checkout from the saved-address fetch.
    ///
    /// The default address is pre-selected, else the first one. With no
    /// saved addresses, or when they could not be loaded, the new-address
    /// form is forced.
    #[must_use]
    pub fn start(saved: Option<&[Address]>, user: &CurrentUser) -> Self {
        let new_address = AddressInput {
            name: user.name.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            ..AddressInput::default()
        };
        Self {
            step: CheckoutStep::Address,
            choice: initial_choice(saved.unwrap_or_default()),
            new_address,
            postcode_query: String::new(),
            suggestions: Vec::new(),
            lookup_error: None,
            errors: FieldErrors::new(),
            processing: false,
            processing_since: None,
        }
    }

    /// Re-check the selection against a fresh saved-address list.
    ///
    /// A selected address that no longer exists falls back to the initial
    /// choice rules.
    pub fn reconcile(&mut self, saved: Option<&[Address]>) {
        let saved = saved.unwrap_or_default();
        if let AddressChoice::Saved(id) = &self.choice
            && !saved.iter().any(|a| &a.id == id)
        {
            self.choice = initial_choice(saved);
            self.step = CheckoutStep::Address;
        }
    }

    /// Pick a saved address.
    pub fn choose_saved(&mut self, id: AddressId) {
        self.choice = AddressChoice::Saved(id);
        self.errors.clear("address");
        self.finish_submission();
    }

    /// Switch to the new-address form.
    pub fn choose_new(&mut self) {
        self.choice = AddressChoice::New;
        self.errors.clear("address");
        self.finish_submission();
    }

    /// Replace the new-address form contents, clearing errors on the fields
    /// that changed.
    pub fn update_new_address(&mut self, input: AddressInput) {
        let before = std::mem::replace(&mut self.new_address, input);
        let after = &self.new_address;
        for (field, changed) in [
            ("name", before.name != after.name),
            ("phone", before.phone != after.phone),
            ("street", before.street != after.street),
            ("city", before.city != after.city),
            ("county", before.county != after.county),
            ("postcode", before.postcode != after.postcode),
        ] {
            if changed {
                self.errors.clear(field);
            }
        }
    }

    /// Record the outcome of a postcode search.
    pub fn set_suggestions(&mut self, query: &str, result: Result<Vec<AddressSuggestion>, String>) {
        query.clone_into(&mut self.postcode_query);
        match result {
            Ok(suggestions) => {
                self.suggestions = suggestions;
                self.lookup_error = None;
            }
            Err(message) => {
                self.suggestions.clear();
                self.lookup_error = Some(message);
            }
        }
    }

    /// Accept a suggestion: fill the address fields and clear the house
    /// number.
    ///
    /// Returns `false` if no suggestion has that ID.
    pub fn select_suggestion(&mut self, id: &str) -> bool {
        let Some(suggestion) = self.suggestions.iter().find(|s| s.id == id).cloned() else {
            return false;
        };

        suggestion.apply_to(&mut self.new_address, &self.postcode_query);
        self.choice = AddressChoice::New;
        self.suggestions.clear();
        for field in ["street", "city", "county", "postcode"] {
            self.errors.clear(field);
        }
        true
    }

    /// Skip the suggestions: clear street, city, and county, keeping the
    /// searched postcode.
    pub fn manual_entry(&mut self) {
        let postcode = display_postcode(&self.postcode_query);
        self.new_address.clear_for_manual_entry(&postcode);
        self.choice = AddressChoice::New;
        self.suggestions.clear();
        self.lookup_error = None;
    }

    /// Validate the address step and advance to review.
    ///
    /// # Errors
    ///
    /// Returns the field errors (also kept on the draft) when the chosen
    /// address is missing or the new address is incomplete.
    pub fn submit_address(&mut self, saved: &[Address]) -> Result<(), FieldErrors> {
        self.finish_submission();
        let errors = self.address_errors(saved);
        self.errors = errors.clone();
        errors.into_result(())?;
        self.step = CheckoutStep::Review;
        Ok(())
    }

    /// Return to the address step.
    pub fn back(&mut self) {
        self.step = CheckoutStep::Address;
        self.finish_submission();
    }

    /// Mark the draft as submitting.
    ///
    /// Store the marked draft before calling [`CheckoutService::place_order`]
    /// so a second submission from the same session is refused.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InProgress` if a submission is already running.
    pub fn begin_submission(&mut self) -> Result<(), CheckoutError> {
        self.begin_submission_at(Utc::now())
    }

    /// [`Self::begin_submission`] at a given time. A mark older than two
    /// minutes is treated as abandoned.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InProgress` if a recent submission is running.
    pub fn begin_submission_at(&mut self, now: DateTime<Utc>) -> Result<(), CheckoutError> {
        self.expire_stale_submission(now);
        if self.processing {
            return Err(CheckoutError::InProgress);
        }
        self.processing = true;
        self.processing_since = Some(now);
        Ok(())
    }

    /// Clear the submission mark.
    pub fn finish_submission(&mut self) {
        self.processing = false;
        self.processing_since = None;
    }

    /// Clear a submission mark left behind by a request that never finished.
    pub fn expire_stale_submission(&mut self, now: DateTime<Utc>) {
        let stale = self
            .processing_since
            .is_none_or(|since| now - since >= TimeDelta::seconds(SUBMISSION_TIMEOUT_SECS));
        if self.processing && stale {
            warn!("Clearing abandoned order submission");
            self.finish_submission();
        }
    }

    /// The saved address currently selected, if any.
    #[must_use]
    pub fn selected<'s>(&self, saved: &'s [Address]) -> Option<&'s Address> {
        match &self.choice {
            AddressChoice::Saved(id) => saved.iter().find(|a| &a.id == id),
            AddressChoice::New => None,
        }
    }

    /// The address that will be shipped to, as shown on the review step.
    #[must_use]
    pub fn shipping_address(&self, saved: &[Address]) -> Option<ShippingAddress> {
        match &self.choice {
            AddressChoice::Saved(_) => self.selected(saved).map(Address::to_shipping),
            AddressChoice::New => Some(ShippingAddress::from(&AddressPayload::from(
                &self.new_address,
            ))),
        }
    }

    #[must_use]
    pub const fn uses_new_address(&self) -> bool {
        matches!(self.choice, AddressChoice::New)
    }

    fn address_errors(&self, saved: &[Address]) -> FieldErrors {
        match &self.choice {
            AddressChoice::New => self.new_address.validate(),
            AddressChoice::Saved(_) if self.selected(saved).is_some() => FieldErrors::new(),
            AddressChoice::Saved(_) => {
                let mut errors = FieldErrors::new();
                errors.insert("address", "Please select a shipping address");
                errors
            }
        }
    }
}

fn initial_choice(saved: &[Address]) -> AddressChoice {
    saved
        .iter()
        .find(|a| a.is_default)
        .or_else(|| saved.first())
        .map_or(AddressChoice::New, |a| AddressChoice::Saved(a.id.clone()))
}

/// Money lines shown on the review step and sent with the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSummary {
    pub subtotal: Price,
    pub shipping: Price,
    /// Always zero: prices are VAT-inclusive.
    pub tax: Price,
    pub grand_total: Price,
}

impl OrderSummary {
    #[must_use]
    pub fn new(cart: &Cart, shipping_fee: Price) -> Self {
        let subtotal = cart.total();
        let tax = Price::ZERO;
        Self {
            subtotal,
            shipping: shipping_fee,
            tax,
            grand_total: subtotal + tax + shipping_fee,
        }
    }
}

/// Build the order body from the cart and a resolved shipping address.
#[must_use]
pub fn build_order_request(
    user: &CurrentUser,
    cart: &Cart,
    shipping_address: ShippingAddress,
    summary: &OrderSummary,
) -> CreateOrderRequest {
    let items = cart
        .items
        .iter()
        .map(|item| OrderItem {
            product_id: item.product_id.clone(),
            name: item.name().to_string(),
            price: item.unit_price(),
            quantity: item.quantity,
            subtotal: item.subtotal(),
        })
        .collect();

    CreateOrderRequest {
        user_id: user.id.clone(),
        items,
        total_amount: summary.subtotal,
        tax_amount: summary.tax,
        shipping_cost: summary.shipping,
        grand_total: summary.grand_total,
        shipping_address,
        payment_method: PaymentMethod::Stripe,
        customer_email: user.email.clone(),
    }
}

/// Places orders for one authenticated user.
pub struct CheckoutService<'a> {
    api: &'a ApiClient,
    user: &'a CurrentUser,
    shipping_fee: Price,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, user: &'a CurrentUser, shipping_fee: Price) -> Self {
        Self {
            api,
            user,
            shipping_fee,
        }
    }

    /// Place the order and return the payment page URL.
    ///
    /// A new address is saved to the address book first; the draft then
    /// points at the saved copy so a retry does not save it twice. The draft
    /// must already be marked with [`CheckoutDraft::begin_submission`]; any
    /// failure clears the mark so the shopper can retry from review.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::Validation`
    /// without calling the backend, or `CheckoutError::Api` when saving the
    /// address or creating the order fails (including a response with no
    /// payment URL).
    #[instrument(skip_all, fields(user_id = %self.user.id, items = cart.items.len()))]
    pub async fn place_order(
        &self,
        draft: &mut CheckoutDraft,
        cart: &Cart,
        saved: &[Address],
    ) -> Result<String, CheckoutError> {
        let result = self.submit(draft, cart, saved).await;
        if let Err(e) = &result {
            warn!(error = %e, "Order placement failed");
            draft.finish_submission();
        }
        result
    }

    async fn submit(
        &self,
        draft: &mut CheckoutDraft,
        cart: &Cart,
        saved: &[Address],
    ) -> Result<String, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let errors = draft.address_errors(saved);
        if !errors.is_empty() {
            draft.errors = errors.clone();
            draft.step = CheckoutStep::Address;
            return Err(CheckoutError::Validation(errors));
        }

        let shipping_address = match draft.selected(saved) {
            Some(address) => address.to_shipping(),
            None => {
                let payload = AddressPayload::from(&draft.new_address);
                let created = self.api.create_address(&self.user.token, &payload).await?;
                info!(address_id = %created.id, "Saved new shipping address");
                draft.choice = AddressChoice::Saved(created.id.clone());
                created.to_shipping()
            }
        };

        let summary = OrderSummary::new(cart, self.shipping_fee);
        let request = build_order_request(self.user, cart, shipping_address, &summary);
        let checkout_url = self.api.create_order(&self.user.token, &request).await?;

        info!("Order created, redirecting to payment");
        Ok(checkout_url)
    }
}
