//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Home page
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (backend reachable)
//!
//! # Catalog
//! GET  /products                       - Product listing (?category&page&sort&order)
//! GET  /products/{id}                  - Product detail
//! POST /products/{id}/cart             - Add to cart (HTMX, triggers cart-updated)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                           - Cart page
//! POST /cart/items/{product_id}        - Set quantity; below 1 removes
//! POST /cart/items/{product_id}/remove - Remove line
//! POST /cart/clear                     - Remove every line
//! GET  /cart/count                     - Cart count badge
//!
//! # Checkout (requires auth, non-empty cart)
//! GET  /checkout                       - Current step (address or review)
//! POST /checkout/address               - Submit address step
//! POST /checkout/address/choice        - Switch saved/new address (HTMX)
//! POST /checkout/postcode              - Postcode search (HTMX)
//! POST /checkout/postcode/select       - Accept a suggestion (HTMX)
//! POST /checkout/postcode/manual       - Enter the address manually (HTMX)
//! POST /checkout/back                  - Return to the address step
//! POST /checkout/place                 - Place order, redirect to payment
//!
//! # Orders (requires auth)
//! GET  /orders/{id}/success            - Payment return (?session_id)
//! GET  /orders/{id}                    - Order details
//! GET  /orders/{id}/invoice            - Printable invoice
//! POST /orders/{id}/cancel             - Cancel while processing
//!
//! # Account (requires auth)
//! GET  /account                        - Profile, order history, addresses
//! GET  /account/addresses/new          - New address form
//! POST /account/addresses              - Create address
//! GET  /account/addresses/{id}/edit    - Edit address form
//! POST /account/addresses/{id}         - Update address
//! POST /account/addresses/{id}/delete  - Delete address
//! POST /account/addresses/{id}/default - Make default
//! POST /account/postcode               - Postcode search (HTMX)
//! POST /account/postcode/select        - Accept a suggestion (HTMX)
//! POST /account/postcode/manual        - Enter the address manually (HTMX)
//!
//! # Auth
//! GET  /login, POST /login             - Login
//! GET  /register, POST /register       - Registration
//! POST /logout                         - Logout
//!
//! # Admin (requires admin)
//! GET  /admin                          - Dashboard (?days=7|30|90)
//! GET  /admin/products                 - Product list
//! ...                                  - see `admin::routes`
//! ```

pub mod account;
pub mod address_form;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod home;
pub mod orders;
pub mod products;

use axum::{
    Router,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::api::ApiError;
use crate::error::AppError;

use crate::middleware::{api_rate_limiter, auth_rate_limiter, lookup_rate_limiter, take_flashes};
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

/// HTMX event fired whenever the cart changes.
pub const CART_UPDATED: &str = "cart-updated";

/// `HX-Trigger` header announcing a cart change, for `AppendHeaders`.
pub const CART_UPDATED_TRIGGER: [(&str, &str); 1] = [("HX-Trigger", CART_UPDATED)];

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("HX-Request")
}

/// Response that logs the user out and sends them to login, for handlers
/// that render their own errors.
#[must_use]
pub fn session_expired() -> Response {
    AppError::Api(ApiError::Unauthorized).into_response()
}

/// Data every full page needs for the shared layout.
pub struct Chrome {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Chrome {
    /// Build the layout data, taking any pending flash notifications.
    pub async fn new(session: &Session, user: Option<CurrentUser>) -> Self {
        Self {
            user,
            flashes: take_flashes(session).await,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}

/// Previous/next links for a paginated list.
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    /// Link prefix ending in `?` or `&`, to which `page=N` is appended.
    base: String,
}

impl Pager {
    #[must_use]
    pub fn new(page: u32, total_pages: u32, path: &str, params: &[(&str, &str)]) -> Self {
        let query = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let base = if query.is_empty() {
            format!("{path}?")
        } else {
            format!("{path}?{query}&")
        };
        Self {
            page: page.max(1),
            total_pages: total_pages.max(1),
            base,
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub fn prev(&self) -> String {
        format!("{}page={}", self.base, self.page.saturating_sub(1).max(1))
    }

    #[must_use]
    pub fn next(&self) -> String {
        format!("{}page={}", self.base, self.page + 1)
    }
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route(
            "/{id}/cart",
            post(products::add_to_cart).layer(api_rate_limiter()),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/items/{product_id}", post(cart::update))
        .route("/items/{product_id}/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .layer(api_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let lookup = Router::new()
        .route("/postcode", post(checkout::search_postcode))
        .layer(lookup_rate_limiter());

    Router::new()
        .route("/", get(checkout::show))
        .route("/address", post(checkout::submit_address))
        .route("/address/choice", post(checkout::choose_address))
        .route("/postcode/select", post(checkout::select_suggestion))
        .route("/postcode/manual", post(checkout::manual_entry))
        .route("/back", post(checkout::back))
        .route("/place", post(checkout::place_order))
        .merge(lookup)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(orders::show))
        .route("/{id}/success", get(orders::success))
        .route("/{id}/invoice", get(orders::invoice))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    let lookup = Router::new()
        .route("/postcode", post(account::search_postcode))
        .layer(lookup_rate_limiter());

    Router::new()
        .route("/", get(account::index))
        .route("/addresses", post(account::create_address))
        .route("/addresses/new", get(account::new_address))
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/edit", get(account::edit_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
        .route("/postcode/select", post(account::select_suggestion))
        .route("/postcode/manual", post(account::manual_entry))
        .merge(lookup)
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(auth_rate_limiter())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(auth_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/admin", admin::routes())
        .merge(auth_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pager_links() {
        let pager = Pager::new(2, 3, "/products", &[("category", "shoes"), ("sort", "")]);
        assert!(pager.has_prev());
        assert!(pager.has_next());
        assert_eq!(pager.prev(), "/products?category=shoes&page=1");
        assert_eq!(pager.next(), "/products?category=shoes&page=3");

        let single = Pager::new(1, 0, "/admin/orders", &[]);
        assert!(!single.has_prev());
        assert!(!single.has_next());
        assert_eq!(single.next(), "/admin/orders?page=2");
    }
}
