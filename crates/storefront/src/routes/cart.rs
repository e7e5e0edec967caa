//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart lives in the backend; every change is followed by a full
//! refetch and the fragment is re-rendered from that.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{AppendHeaders, IntoResponse, Response},
};
use highstreet_core::{Price, ProductId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::{CART_UPDATED_TRIGGER, Chrome, session_expired};
use crate::services::{Cart, CartError, CartService};
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
    /// Upper bound for the quantity input, when the backend sent stock.
    pub max_quantity: Option<u32>,
    pub unavailable: bool,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::ZERO.display(),
            item_count: 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .items
                .iter()
                .map(|item| {
                    let product = item.product.as_ref();
                    CartItemView {
                        product_id: item.product_id.to_string(),
                        name: item.name().to_string(),
                        quantity: item.quantity,
                        price: item.unit_price().display(),
                        line_price: item.subtotal().display(),
                        image: product.and_then(|p| p.image.as_ref()).map(|i| i.data_uri()),
                        max_quantity: product.and_then(|p| p.stock),
                        unavailable: product.is_some_and(|p| !p.availability),
                    }
                })
                .collect(),
            subtotal: cart.total().display(),
            item_count: cart.count(),
        }
    }
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub quantity: i64,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub chrome: Chrome,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display cart page.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let (cart, error) = match CartService::new(state.api(), &user.token).fetch().await {
        Ok(cart) => (CartView::from(&cart), None),
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch cart");
            (CartView::empty(), Some(e.user_message("Failed to load cart")))
        }
    };

    CartShowTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        cart,
        error,
    }
    .into_response()
}

/// Update item quantity (HTMX). A quantity below one removes the line.
#[instrument(skip(state, user, form), fields(product_id = %product_id, quantity = form.quantity))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let service = CartService::new(state.api(), &user.token);
    let result = service.update(&product_id, form.quantity).await;
    items_fragment(&service, result, "Failed to update cart").await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, user), fields(product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Response {
    let service = CartService::new(state.api(), &user.token);
    let result = service.remove(&product_id).await;
    items_fragment(&service, result, "Failed to remove item").await
}

/// Remove every item (HTMX).
///
/// A partial failure still re-renders whatever is left in the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Response {
    let service = CartService::new(state.api(), &user.token);
    let result = service.clear().await;
    items_fragment(&service, result, "Failed to clear cart").await
}

/// Get cart count badge (HTMX). Anonymous visitors have an empty cart.
pub async fn count(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> Response {
    let Some(CurrentUser { token, .. }) = user else {
        return CartCountTemplate { count: 0 }.into_response();
    };

    match CartService::new(state.api(), &token).fetch().await {
        Ok(cart) => CartCountTemplate {
            count: cart.count(),
        }
        .into_response(),
        Err(e) if e.is_unauthorized() => session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch cart count");
            CartCountTemplate { count: 0 }.into_response()
        }
    }
}

/// Render the cart items fragment after a mutation.
///
/// On failure the cart is refetched so the fragment shows what the backend
/// actually holds, with the error message above it.
async fn items_fragment(
    service: &CartService<'_>,
    result: Result<Cart, CartError>,
    fallback: &str,
) -> Response {
    let (cart, error) = match result {
        Ok(cart) => (CartView::from(&cart), None),
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Cart change failed");
            let cart = service
                .fetch()
                .await
                .map_or_else(|_| CartView::empty(), |c| CartView::from(&c));
            (cart, Some(e.user_message(fallback)))
        }
    };

    (
        AppendHeaders(CART_UPDATED_TRIGGER),
        CartItemsTemplate { cart, error },
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::CartItem;

    #[test]
    fn test_cart_view_totals() {
        let items: Vec<CartItem> = serde_json::from_value(json!([
            { "productId": "p1", "quantity": 2,
              "product": { "name": "Mug", "price": 10.0, "availability": true, "stock": 7 } },
            { "productId": "p2", "quantity": 1,
              "product": { "name": "Tote", "price": 5.0, "availability": false } }
        ]))
        .unwrap();
        let view = CartView::from(&Cart { items });

        assert_eq!(view.subtotal, "£25.00");
        assert_eq!(view.item_count, 3);
        assert_eq!(view.items[0].line_price, "£20.00");
        assert_eq!(view.items[0].max_quantity, Some(7));
        assert!(view.items[1].unavailable);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::empty();
        assert!(view.is_empty());
        assert_eq!(view.subtotal, "£0.00");
    }
}
