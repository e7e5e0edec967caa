//! Status enums for orders, payments, and stock.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Any status may be set from any other by an admin; the backend does not
/// enforce a transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in display order.
    pub const ALL: [Self; 4] = [
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire value used by the backend and in form fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Badge colour class suffix.
    #[must_use]
    pub const fn badge(&self) -> &'static str {
        match self {
            Self::Processing => "warning",
            Self::Shipped => "info",
            Self::Delivered => "success",
            Self::Cancelled => "danger",
        }
    }

    /// Whether the customer may still cancel the order.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment status reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Unknown => "unknown",
        }
    }

    /// Badge colour class suffix.
    #[must_use]
    pub const fn badge(&self) -> &'static str {
        match self {
            Self::Completed => "success",
            Self::Pending => "warning",
            Self::Failed | Self::Refunded | Self::Unknown => "danger",
        }
    }
}

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Stripe,
    Paypal,
    Cod,
}

impl PaymentMethod {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stripe => "Credit Card",
            Self::Paypal => "PayPal",
            Self::Cod => "Cash on Delivery",
        }
    }
}

/// Stock level derived from a product's stock count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    /// Stock below this count is reported as low.
    pub const LOW_STOCK_THRESHOLD: u32 = 10;

    /// Derive the status from a stock count.
    #[must_use]
    pub const fn from_stock(stock: u32) -> Self {
        if stock == 0 {
            Self::OutOfStock
        } else if stock < Self::LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OutOfStock => "Out of Stock",
            Self::LowStock => "Low Stock",
            Self::InStock => "In Stock",
        }
    }

    /// Badge colour class suffix.
    #[must_use]
    pub const fn badge(&self) -> &'static str {
        match self {
            Self::OutOfStock => "danger",
            Self::LowStock => "warning",
            Self::InStock => "success",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");

        let parsed: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn test_order_status_from_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_unknown_payment_status() {
        let parsed: PaymentStatus = serde_json::from_str("\"disputed\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Unknown);
    }

    #[test]
    fn test_stock_status_thresholds() {
        assert_eq!(StockStatus::from_stock(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_stock(1), StockStatus::LowStock);
        assert_eq!(StockStatus::from_stock(9), StockStatus::LowStock);
        assert_eq!(StockStatus::from_stock(10), StockStatus::InStock);
    }
}
