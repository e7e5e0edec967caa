//! Order route handlers: payment return, details, invoice, cancel.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use highstreet_core::OrderId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::Order;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireAuth, push_flash};
use crate::models::{Flash, session_keys};
use crate::routes::Chrome;
use crate::services::{CartService, CheckoutDraft};
use crate::state::AppState;

/// Query string on the payment return URL.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/success.html")]
pub struct OrderSuccessTemplate {
    pub chrome: Chrome,
    pub order: Order,
}

/// Order details page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub chrome: Chrome,
    pub order: Order,
}

/// Printable invoice template, shared with the back-office.
#[derive(Template, WebTemplate)]
#[template(path = "orders/invoice.html")]
pub struct InvoiceTemplate {
    pub order: Order,
    /// Where the "back" link goes.
    pub back_url: String,
}

/// Payment return from the hosted checkout.
///
/// Confirms the payment when the provider sent a session ID, then empties
/// the cart. Neither failure stops the confirmation page from rendering.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id, order_id = %id))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Query(query): Query<SuccessQuery>,
) -> Result<impl IntoResponse> {
    if let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty()) {
        match state
            .api()
            .confirm_payment(&user.token, &id, session_id)
            .await
        {
            Ok(()) => add_breadcrumb("checkout", "Payment confirmed", None),
            Err(e) => tracing::warn!(error = %e, "Payment confirmation failed"),
        }
    }

    if let Err(e) = CartService::new(state.api(), &user.token).clear().await {
        tracing::warn!(error = %e, "Failed to clear cart after payment");
    }
    if let Err(e) = session
        .remove::<CheckoutDraft>(session_keys::CHECKOUT)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear checkout draft");
    }

    let order = state.api().get_order(&user.token, &id).await?;

    Ok(OrderSuccessTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        order,
    })
}

/// Order details page.
#[instrument(skip(state, session, user), fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state.api().get_order_details(&user.token, &id).await?;

    Ok(OrderShowTemplate {
        chrome: Chrome::new(&session, Some(user)).await,
        order,
    })
}

/// Printable invoice.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state.api().get_order_details(&user.token, &id).await?;

    Ok(InvoiceTemplate {
        back_url: format!("/orders/{}", order.id),
        order,
    })
}

/// Cancel an order that has not shipped.
#[instrument(skip(state, session, user), fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let back = Redirect::to(&format!("/orders/{id}"));
    let order = state.api().get_order_details(&user.token, &id).await?;

    if !order.order_status.is_cancellable() {
        push_flash(
            &session,
            Flash::error(format!(
                "This order is {} and can no longer be cancelled",
                order.order_status.label().to_lowercase()
            )),
        )
        .await;
        return Ok(back.into_response());
    }

    match state.api().cancel_order(&user.token, &id).await {
        Ok(()) => {
            tracing::info!("Order cancelled by customer");
            push_flash(&session, Flash::success("Order cancelled")).await;
        }
        Err(e @ crate::api::ApiError::Unauthorized) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Order cancellation failed");
            push_flash(&session, Flash::error(e.user_message("Failed to cancel order"))).await;
        }
    }
    Ok(back.into_response())
}
