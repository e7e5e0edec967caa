//! Order endpoints.

use reqwest::Method;
use tracing::instrument;

use highstreet_core::OrderId;

use super::{
    ApiClient, ApiError, ConfirmPaymentRequest, CreateOrderRequest, CreateOrderResponse, Order,
    OrderDetailsResponse, OrderPage, StatusUpdate, segment,
};

impl ApiClient {
    /// Create an order and start a hosted payment session.
    ///
    /// Returns the payment page URL. A response without one means no payment
    /// can be taken and is treated as a failed order placement.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCheckoutUrl` if the backend sent no
    /// redirect, or another error if the request fails.
    #[instrument(skip(self, token, request), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        token: &str,
        request: &CreateOrderRequest,
    ) -> Result<String, ApiError> {
        let response: CreateOrderResponse = self
            .execute(
                self.request(Method::POST, "/orders", Some(token))
                    .json(request),
            )
            .await?;

        response
            .checkout_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ApiError::MissingCheckoutUrl)
    }

    /// Confirm a completed payment session for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the confirmation.
    #[instrument(skip(self, token, session_id), fields(order_id = %id))]
    pub async fn confirm_payment(
        &self,
        token: &str,
        id: &OrderId,
        session_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/orders/{}/success", segment(id.as_str()));
        let body = ConfirmPaymentRequest {
            session_id: session_id.to_string(),
        };
        self.execute_unit(self.request(Method::POST, &path, Some(token)).json(&body))
            .await
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order(&self, token: &str, id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("/orders/{}", segment(id.as_str()));
        self.execute(self.request(Method::GET, &path, Some(token)))
            .await
    }

    /// Get an order through the details endpoint.
    ///
    /// The details endpoint wraps the order in `{success, order, error}`;
    /// an unsuccessful envelope is reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order is missing or the envelope
    /// reports failure.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order_details(&self, token: &str, id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("/orders/{}/details", segment(id.as_str()));
        let envelope: OrderDetailsResponse = self
            .execute(self.request(Method::GET, &path, Some(token)))
            .await?;

        match envelope {
            OrderDetailsResponse {
                success: true,
                order: Some(order),
                ..
            } => Ok(order),
            OrderDetailsResponse { error, .. } => Err(ApiError::NotFound(
                error.unwrap_or_else(|| "Order not found".to_string()),
            )),
        }
    }

    /// Cancel an order that has not shipped yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the cancellation.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn cancel_order(&self, token: &str, id: &OrderId) -> Result<(), ApiError> {
        let path = format!("/orders/{}/cancel", segment(id.as_str()));
        self.execute_unit(self.request(Method::PUT, &path, Some(token)))
            .await
    }

    /// Get the current user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_user_orders(
        &self,
        token: &str,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage, ApiError> {
        self.execute(
            self.request(Method::GET, "/user/orders", Some(token))
                .query(&[("page", page), ("limit", limit)]),
        )
        .await
    }

    /// Change an order's status (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self, token), fields(order_id = %id, status = %update.status()))]
    pub async fn update_order_status(
        &self,
        token: &str,
        id: &OrderId,
        update: &StatusUpdate,
    ) -> Result<(), ApiError> {
        let path = format!("/orders/{}/status", segment(id.as_str()));
        self.execute_unit(self.request(Method::PUT, &path, Some(token)).json(update))
            .await
    }
}
