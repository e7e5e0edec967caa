//! Saved address endpoints.

use reqwest::Method;
use tracing::instrument;

use highstreet_core::AddressId;

use super::{
    Address, AddressEnvelope, AddressListEnvelope, AddressPayload, ApiClient, ApiError, segment,
};

impl ApiClient {
    /// Get the user's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn get_addresses(&self, token: &str) -> Result<Vec<Address>, ApiError> {
        let envelope: AddressListEnvelope = self
            .execute(self.request(Method::GET, "/user/addresses", Some(token)))
            .await?;
        Ok(envelope.addresses)
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip_all)]
    pub async fn create_address(
        &self,
        token: &str,
        payload: &AddressPayload,
    ) -> Result<Address, ApiError> {
        let envelope: AddressEnvelope = self
            .execute(
                self.request(Method::POST, "/user/address", Some(token))
                    .json(payload),
            )
            .await?;
        Ok(envelope.address)
    }

    /// Replace a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, token, payload), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        token: &str,
        id: &AddressId,
        payload: &AddressPayload,
    ) -> Result<(), ApiError> {
        let path = format!("/user/address/{}", segment(id.as_str()));
        self.execute_unit(self.request(Method::PUT, &path, Some(token)).json(payload))
            .await
    }

    /// Delete a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn delete_address(&self, token: &str, id: &AddressId) -> Result<(), ApiError> {
        let path = format!("/user/address/{}", segment(id.as_str()));
        self.execute_unit(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn set_default_address(&self, token: &str, id: &AddressId) -> Result<(), ApiError> {
        let path = format!("/user/address/{}/default", segment(id.as_str()));
        self.execute_unit(self.request(Method::PUT, &path, Some(token)))
            .await
    }
}
