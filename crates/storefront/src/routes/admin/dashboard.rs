//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{
    ApiError, Category, DashboardStats, ProductQuery, ProductSort, STATS_WINDOWS, SortOrder,
};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::routes::products::ProductCard;
use crate::routes::{Chrome, session_expired};
use crate::state::AppState;

/// Day window shown when none (or an unsupported one) is requested.
const DEFAULT_WINDOW: u32 = 7;

/// Products shown under "recently added".
const RECENT_PRODUCTS: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub days: Option<u32>,
}

impl DashboardQuery {
    /// The requested window, if it is one the backend supports.
    #[must_use]
    pub fn window(&self) -> u32 {
        self.days
            .filter(|d| STATS_WINDOWS.contains(d))
            .unwrap_or(DEFAULT_WINDOW)
    }
}

/// An entry in the period selector.
pub struct WindowOption {
    pub days: u32,
    pub selected: bool,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub chrome: Chrome,
    pub days: u32,
    pub windows: Vec<WindowOption>,
    pub stats: DashboardStats,
    pub stats_error: Option<String>,
    pub recent_products: Vec<ProductCard>,
    pub categories: Vec<Category>,
}

/// Display the dashboard.
#[instrument(skip(state, session, admin, query), fields(admin_id = %admin.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let days = query.window();
    let recent = ProductQuery {
        limit: RECENT_PRODUCTS,
        sort: Some(ProductSort::CreatedAt),
        order: Some(SortOrder::Desc),
        ..ProductQuery::default()
    };

    let (stats, products, categories) = tokio::join!(
        state.api().get_stats(&admin.token, days),
        state.api().get_products(&recent),
        state.api().get_admin_categories(&admin.token),
    );

    let (stats, stats_error) = match stats {
        Ok(stats) => (stats, None),
        Err(ApiError::Unauthorized) => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, days, "Failed to load dashboard stats");
            (
                DashboardStats::default(),
                Some(e.user_message("Failed to load statistics")),
            )
        }
    };
    let recent_products = products
        .map(|page| page.products.iter().map(ProductCard::from).collect())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load recent products");
            Vec::new()
        });
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    DashboardTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        days,
        windows: STATS_WINDOWS
            .iter()
            .map(|&d| WindowOption {
                days: d,
                selected: d == days,
            })
            .collect(),
        stats,
        stats_error,
        recent_products,
        categories,
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_falls_back_to_default() {
        assert_eq!(DashboardQuery { days: Some(30) }.window(), 30);
        assert_eq!(DashboardQuery { days: Some(14) }.window(), 7);
        assert_eq!(DashboardQuery { days: None }.window(), 7);
    }
}
