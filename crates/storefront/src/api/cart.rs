//! Cart endpoints.
//!
//! The backend has no bulk operations: clearing a cart is one delete per
//! line, driven by the cart service.

use reqwest::Method;
use tracing::instrument;

use highstreet_core::ProductId;

use super::{ApiClient, ApiError, CartItem, CartLineInput, segment};

impl ApiClient {
    /// Get the user's cart lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, token: &str) -> Result<Vec<CartItem>, ApiError> {
        self.execute(self.request(Method::GET, "/cart", Some(token)))
            .await
    }

    /// Add a product to the cart, or set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn set_cart_line(
        &self,
        token: &str,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let body = CartLineInput {
            product_id: product_id.clone(),
            quantity,
        };
        self.execute_unit(self.request(Method::POST, "/cart", Some(token)).json(&body))
            .await
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn remove_cart_line(
        &self,
        token: &str,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let path = format!("/cart/{}", segment(product_id.as_str()));
        self.execute_unit(self.request(Method::DELETE, &path, Some(token)))
            .await
    }
}
