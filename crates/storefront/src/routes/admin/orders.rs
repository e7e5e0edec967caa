//! Back-office order management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use highstreet_core::{FieldErrors, OrderId, OrderStatus};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, Order};
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash};
use crate::models::Flash;
use crate::routes::orders::InvoiceTemplate;
use crate::routes::{Chrome, Pager};
use crate::services::orders::ADMIN_ORDERS_PER_PAGE;
use crate::services::{OrderFilter, StatusForm};
use crate::state::AppState;

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/index.html")]
pub struct AdminOrdersTemplate {
    pub chrome: Chrome,
    pub orders: Vec<Order>,
    pub search: String,
    pub status: String,
    pub statuses: [OrderStatus; 4],
    /// Orders on the loaded page before filtering.
    pub loaded: usize,
    pub pager: Pager,
}

/// Order detail template with the status form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/show.html")]
pub struct AdminOrderTemplate {
    pub chrome: Chrome,
    pub order: Order,
    pub form: StatusForm,
    pub errors: FieldErrors,
    pub statuses: [OrderStatus; 4],
}

impl AdminOrderTemplate {
    /// The error message for a field, or an empty string.
    #[must_use]
    pub fn error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

/// Order list. Search and status filter apply to the loaded page.
#[instrument(skip(state, session, admin, filter), fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Query(filter): Query<OrderFilter>,
) -> Result<impl IntoResponse> {
    let page = filter.page.unwrap_or(1).max(1);
    let loaded = state
        .api()
        .get_admin_orders(&admin.token, page, ADMIN_ORDERS_PER_PAGE)
        .await?;

    let orders: Vec<Order> = filter.apply(&loaded.orders).into_iter().cloned().collect();
    let status = filter.status().map(|s| s.as_str()).unwrap_or_default();

    Ok(AdminOrdersTemplate {
        pager: Pager::new(
            page,
            loaded.total_pages,
            "/admin/orders",
            &[("search", filter.search.trim()), ("status", status)],
        ),
        chrome: Chrome::new(&session, Some(admin)).await,
        orders,
        search: filter.search.trim().to_string(),
        status: status.to_string(),
        statuses: OrderStatus::ALL,
        loaded: loaded.orders.len(),
    })
}

/// Order detail.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state.api().get_order_details(&admin.token, &id).await?;

    Ok(AdminOrderTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        form: StatusForm::for_order(&order),
        order,
        errors: FieldErrors::new(),
        statuses: OrderStatus::ALL,
    })
}

/// Change an order's status.
///
/// Missing shipping details re-render the form with field errors and send
/// nothing to the backend.
#[instrument(skip(state, session, admin, form), fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let update = match form.to_update(Utc::now()) {
        Ok(update) => update,
        Err(errors) => {
            let order = state.api().get_order_details(&admin.token, &id).await?;
            return Ok(AdminOrderTemplate {
                chrome: Chrome::new(&session, Some(admin)).await,
                order,
                form,
                errors,
                statuses: OrderStatus::ALL,
            }
            .into_response());
        }
    };

    match state
        .api()
        .update_order_status(&admin.token, &id, &update)
        .await
    {
        Ok(()) => {
            tracing::info!(status = %update.status(), "Order status updated");
            push_flash(
                &session,
                Flash::success(format!("Order marked as {}", update.status().label())),
            )
            .await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Order status update failed");
            push_flash(&session, Flash::error(e.user_message("Failed to update status"))).await;
        }
    }
    Ok(Redirect::to(&format!("/admin/orders/{id}")).into_response())
}

/// Printable invoice.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, order_id = %id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state.api().get_order_details(&admin.token, &id).await?;

    Ok(InvoiceTemplate {
        back_url: format!("/admin/orders/{}", order.id),
        order,
    })
}
