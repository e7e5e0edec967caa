//! The customer's address book.
//!
//! Every mutation refetches the list. After a default change the refetched
//! list is normalised so exactly one address, the chosen one, is default,
//! whatever the backend echoes back.

use highstreet_core::{AddressId, AddressInput, FieldErrors};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::api::{Address, AddressPayload, ApiClient, ApiError};

/// Errors from address book operations.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The form failed validation; nothing was sent.
    #[error("address validation failed: {0}")]
    Validation(FieldErrors),

    /// No saved address has that ID.
    #[error("address not found")]
    NotFound,

    /// The default address cannot be deleted while others exist.
    #[error("default address cannot be deleted")]
    DefaultInUse,

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AddressError {
    /// Whether the backend rejected the session token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }

    /// Message for the flash notification.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::NotFound => "Address not found".to_string(),
            Self::DefaultInUse => {
                "Cannot delete default address. Please set another address as default first."
                    .to_string()
            }
            Self::Api(e) => e.user_message(fallback),
        }
    }
}

/// Whether an address may be deleted from `addresses`.
#[must_use]
pub fn can_delete(address: &Address, addresses: &[Address]) -> bool {
    !address.is_default || addresses.len() <= 1
}

/// Force `chosen` to be the only default in the list.
pub fn enforce_single_default(addresses: &mut [Address], chosen: &AddressId) {
    for address in addresses.iter_mut() {
        address.is_default = &address.id == chosen;
    }
}

/// Address book operations for one authenticated user.
pub struct AddressBook<'a> {
    api: &'a ApiClient,
    token: &'a str,
}

impl<'a> AddressBook<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, token: &'a str) -> Self {
        Self { api, token }
    }

    /// Fetch the saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn list(&self) -> Result<Vec<Address>, AddressError> {
        Ok(self.api.get_addresses(self.token).await?)
    }

    /// Fetch one saved address.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if no address has that ID.
    pub async fn get(&self, id: &AddressId) -> Result<Address, AddressError> {
        self.list()
            .await?
            .into_iter()
            .find(|a| &a.id == id)
            .ok_or(AddressError::NotFound)
    }

    /// Validate and save a new address, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` without calling the backend, or
    /// an error if the backend rejects the address.
    #[instrument(skip_all)]
    pub async fn create(&self, input: &AddressInput) -> Result<Vec<Address>, AddressError> {
        validated(input)?;
        let created = self
            .api
            .create_address(self.token, &AddressPayload::from(input))
            .await?;
        self.refetch_with_default(input.is_default.then_some(&created.id))
            .await
    }

    /// Validate and replace a saved address, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` without calling the backend, or
    /// an error if the backend rejects the update.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update(
        &self,
        id: &AddressId,
        input: &AddressInput,
    ) -> Result<Vec<Address>, AddressError> {
        validated(input)?;
        self.api
            .update_address(self.token, id, &AddressPayload::from(input))
            .await?;
        self.refetch_with_default(input.is_default.then_some(id))
            .await
    }

    /// Delete a saved address, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::DefaultInUse` without calling the backend when
    /// the address is the default and others exist.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete(&self, id: &AddressId) -> Result<Vec<Address>, AddressError> {
        let addresses = self.list().await?;
        let address = addresses
            .iter()
            .find(|a| &a.id == id)
            .ok_or(AddressError::NotFound)?;
        if !can_delete(address, &addresses) {
            return Err(AddressError::DefaultInUse);
        }

        self.api.delete_address(self.token, id).await?;
        self.list().await
    }

    /// Make an address the default, then refetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn set_default(&self, id: &AddressId) -> Result<Vec<Address>, AddressError> {
        self.api.set_default_address(self.token, id).await?;
        self.refetch_with_default(Some(id)).await
    }

    async fn refetch_with_default(
        &self,
        chosen: Option<&AddressId>,
    ) -> Result<Vec<Address>, AddressError> {
        let mut addresses = self.list().await?;
        if let Some(chosen) = chosen {
            if !addresses.iter().any(|a| &a.id == chosen) {
                warn!(address_id = %chosen, "Default address missing from refetched list");
                return Ok(addresses);
            }
            let defaults = addresses.iter().filter(|a| a.is_default).count();
            if defaults != 1 {
                warn!(defaults, "Backend returned an inconsistent default address set");
            }
            enforce_single_default(&mut addresses, chosen);
        }
        Ok(addresses)
    }
}

fn validated(input: &AddressInput) -> Result<(), AddressError> {
    input.validate().into_result(()).map_err(AddressError::Validation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn addresses(defaults: &[bool]) -> Vec<Address> {
        defaults
            .iter()
            .enumerate()
            .map(|(i, is_default)| {
                serde_json::from_value(json!({ "_id": format!("a{i}"), "isDefault": is_default }))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_enforce_single_default() {
        let mut list = addresses(&[true, true, false]);
        enforce_single_default(&mut list, &AddressId::new("a2"));

        let defaults: Vec<_> = list.iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id.as_str(), "a2");
    }

    #[test]
    fn test_can_delete() {
        let list = addresses(&[true, false]);
        assert!(!can_delete(&list[0], &list));
        assert!(can_delete(&list[1], &list));

        let only = addresses(&[true]);
        assert!(can_delete(&only[0], &only));
    }

    #[test]
    fn test_default_in_use_message() {
        assert!(
            AddressError::DefaultInUse
                .user_message("x")
                .starts_with("Cannot delete default address")
        );
    }
}
