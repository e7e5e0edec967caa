//! Cart operations against the backend cart.
//!
//! The backend owns the cart. Every mutation is a full round-trip followed
//! by a refetch of the whole cart, so the returned [`Cart`] always reflects
//! what the backend holds.

use highstreet_core::{Price, ProductId};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError, CartItem, Product};

/// The user's cart as last fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of `price × quantity` over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Total number of units.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for a product, if it is in the cart.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product is switched off in the catalog.
    #[error("product is unavailable")]
    Unavailable,

    /// The product has no stock.
    #[error("product is out of stock")]
    OutOfStock,

    /// More units were requested than are in stock.
    #[error("only {available} in stock")]
    InsufficientStock { available: u32 },

    /// Quantity must be at least one when adding.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Clearing stopped part-way; some lines were removed.
    #[error("removed {removed} of {total} items before failing: {source}")]
    PartialClear {
        removed: usize,
        total: usize,
        #[source]
        source: ApiError,
    },

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// Whether the backend rejected the session token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::Unauthorized)
                | Self::PartialClear {
                    source: ApiError::Unauthorized,
                    ..
                }
        )
    }

    /// Message for the flash notification.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Unavailable => "This product is currently unavailable".to_string(),
            Self::OutOfStock => "This product is out of stock".to_string(),
            Self::InsufficientStock { available } => {
                format!("Only {available} left in stock")
            }
            Self::InvalidQuantity => "Quantity must be at least 1".to_string(),
            Self::PartialClear { removed, total, .. } => {
                format!("Removed {removed} of {total} items before an error occurred")
            }
            Self::Api(e) => e.user_message(fallback),
        }
    }
}

/// Check whether `quantity` units of `product` may be added to a cart.
///
/// # Errors
///
/// Returns the reason the product cannot be added.
pub fn check_add(product: &Product, quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity);
    }
    if !product.availability {
        return Err(CartError::Unavailable);
    }
    if product.stock == 0 {
        return Err(CartError::OutOfStock);
    }
    if quantity > product.stock {
        return Err(CartError::InsufficientStock {
            available: product.stock,
        });
    }
    Ok(())
}

/// Cart operations for one authenticated user.
pub struct CartService<'a> {
    api: &'a ApiClient,
    token: &'a str,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, token: &'a str) -> Self {
        Self { api, token }
    }

    /// Fetch the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn fetch(&self) -> Result<Cart, CartError> {
        let items = self.api.get_cart(self.token).await?;
        Ok(Cart { items })
    }

    /// Add `quantity` units of a product, then refetch.
    ///
    /// # Errors
    ///
    /// Returns a stock error without calling the backend when the product
    /// cannot be added, or an error if the backend rejects the change.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: &Product, quantity: u32) -> Result<Cart, CartError> {
        check_add(product, quantity)?;
        self.api
            .set_cart_line(self.token, &product.id, quantity)
            .await?;
        self.fetch().await
    }

    /// Set the quantity of a line, then refetch.
    ///
    /// A quantity below one removes the line instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update(&self, product_id: &ProductId, quantity: i64) -> Result<Cart, CartError> {
        let Ok(quantity) = u32::try_from(quantity) else {
            return self.remove(product_id).await;
        };
        if quantity == 0 {
            return self.remove(product_id).await;
        }
        self.api
            .set_cart_line(self.token, product_id, quantity)
            .await?;
        self.fetch().await
    }

    /// Remove a line, then refetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<Cart, CartError> {
        self.api.remove_cart_line(self.token, product_id).await?;
        self.fetch().await
    }

    /// Remove every line, one request per line.
    ///
    /// The backend has no bulk delete, so this is not atomic: a failure
    /// part-way leaves the remaining lines in place.
    ///
    /// # Errors
    ///
    /// Returns `CartError::PartialClear` with the number of lines removed
    /// if any removal fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<Cart, CartError> {
        let cart = self.fetch().await?;
        let total = cart.items.len();

        for (removed, item) in cart.items.iter().enumerate() {
            if let Err(source) = self.api.remove_cart_line(self.token, &item.product_id).await {
                warn!(removed, total, error = %source, "Cart clear stopped part-way");
                return Err(CartError::PartialClear {
                    removed,
                    total,
                    source,
                });
            }
        }

        info!(total, "Cart cleared");
        self.fetch().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product(stock: u32, availability: bool) -> Product {
        serde_json::from_value(json!({
            "_id": "p1",
            "name": "Wool Scarf",
            "price": 18.0,
            "stock": stock,
            "availability": availability
        }))
        .unwrap()
    }

    fn line(id: &str, price: f64, quantity: u32) -> CartItem {
        serde_json::from_value(json!({
            "productId": id,
            "quantity": quantity,
            "product": { "name": id, "price": price }
        }))
        .unwrap()
    }

    #[test]
    fn test_totals() {
        let cart = Cart {
            items: vec![line("a", 10.0, 2), line("b", 5.0, 1)],
        };
        assert_eq!(cart.total(), Price::from_pence(2500));
        assert_eq!(cart.count(), 3);
        assert!(!cart.is_empty());
        assert!(cart.line(&ProductId::new("b")).is_some());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::default();
        assert_eq!(cart.total(), Price::ZERO);
        assert_eq!(cart.count(), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_check_add() {
        assert!(check_add(&product(5, true), 2).is_ok());
        assert!(matches!(
            check_add(&product(5, false), 1),
            Err(CartError::Unavailable)
        ));
        assert!(matches!(
            check_add(&product(0, true), 1),
            Err(CartError::OutOfStock)
        ));
        assert!(matches!(
            check_add(&product(3, true), 4),
            Err(CartError::InsufficientStock { available: 3 })
        ));
        assert!(matches!(
            check_add(&product(3, true), 0),
            Err(CartError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_partial_clear_message() {
        let err = CartError::PartialClear {
            removed: 2,
            total: 5,
            source: ApiError::Unauthorized,
        };
        assert_eq!(
            err.user_message("Failed to clear cart"),
            "Removed 2 of 5 items before an error occurred"
        );
    }
}
