//! Admin-only endpoints.

use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError, DashboardStats, OrderPage};

/// Day windows offered on the dashboard.
pub const STATS_WINDOWS: [u32; 3] = [7, 30, 90];

impl ApiClient {
    /// Get every customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_admin_orders(
        &self,
        token: &str,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage, ApiError> {
        self.execute(
            self.request(Method::GET, "/admin/orders", Some(token))
                .query(&[("page", page), ("limit", limit)]),
        )
        .await
    }

    /// Get dashboard figures for the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_stats(&self, token: &str, days: u32) -> Result<DashboardStats, ApiError> {
        self.execute(
            self.request(Method::GET, "/stats", Some(token))
                .query(&[("days", days)]),
        )
        .await
    }
}
