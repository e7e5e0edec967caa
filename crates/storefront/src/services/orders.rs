//! Admin order management: status changes and list filtering.

use chrono::{DateTime, Utc};
use highstreet_core::{FieldErrors, OrderStatus};
use serde::Deserialize;

use crate::api::{Order, StatusUpdate};

/// Orders per page on the admin list.
pub const ADMIN_ORDERS_PER_PAGE: u32 = 10;

/// Orders per page on the customer's order history.
pub const USER_ORDERS_PER_PAGE: u32 = 10;

/// The admin status-change form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub courier_name: String,
    #[serde(default)]
    pub tracking_number: String,
}

impl StatusForm {
    /// Prefill the form from an order, keeping any courier details already
    /// recorded.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        let (courier_name, tracking_number) = order
            .shipping_info
            .as_ref()
            .map(|s| (s.courier_name.clone(), s.tracking_number.clone()))
            .unwrap_or_default();
        Self {
            status: order.order_status.as_str().to_string(),
            courier_name,
            tracking_number,
        }
    }

    /// Turn the form into a status update.
    ///
    /// Marking an order shipped needs both a courier and a tracking number;
    /// each missing one gets its own field error.
    ///
    /// # Errors
    ///
    /// Returns field errors for an unknown status or missing shipping
    /// details.
    pub fn to_update(&self, now: DateTime<Utc>) -> Result<StatusUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();

        let Ok(status) = self.status.parse::<OrderStatus>() else {
            errors.insert("status", "Please choose a valid status");
            return Err(errors);
        };

        let update = match status {
            OrderStatus::Processing => StatusUpdate::Processing,
            OrderStatus::Delivered => StatusUpdate::Delivered,
            OrderStatus::Cancelled => StatusUpdate::Cancelled,
            OrderStatus::Shipped => {
                let courier_name = self.courier_name.trim();
                let tracking_number = self.tracking_number.trim();
                if courier_name.is_empty() {
                    errors.insert("courier_name", "Please enter courier company name");
                }
                if tracking_number.is_empty() {
                    errors.insert("tracking_number", "Please enter tracking number");
                }
                StatusUpdate::Shipped {
                    courier_name: courier_name.to_string(),
                    tracking_number: tracking_number.to_string(),
                    shipped_at: now,
                }
            }
        };

        errors.into_result(update)
    }
}

/// Admin order list filters, applied to the loaded page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl OrderFilter {
    /// The status filter, ignoring blank or unknown values.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.status().is_some()
    }

    /// Orders matching the search term and status.
    #[must_use]
    pub fn apply<'o>(&self, orders: &'o [Order]) -> Vec<&'o Order> {
        let status = self.status();
        orders
            .iter()
            .filter(|o| o.matches_search(&self.search))
            .filter(|o| status.is_none_or(|s| o.order_status == s))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
    }

    fn form(status: &str, courier: &str, tracking: &str) -> StatusForm {
        StatusForm {
            status: status.to_string(),
            courier_name: courier.to_string(),
            tracking_number: tracking.to_string(),
        }
    }

    #[test]
    fn test_shipped_requires_both_fields() {
        let errors = form("shipped", "", "  ").to_update(now()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("courier_name"),
            Some("Please enter courier company name")
        );
        assert_eq!(
            errors.get("tracking_number"),
            Some("Please enter tracking number")
        );
    }

    #[test]
    fn test_shipped_trims_fields() {
        let update = form("shipped", " Royal Mail ", " RM1234GB ")
            .to_update(now())
            .unwrap();
        assert_eq!(
            update,
            StatusUpdate::Shipped {
                courier_name: "Royal Mail".to_string(),
                tracking_number: "RM1234GB".to_string(),
                shipped_at: now(),
            }
        );
    }

    #[test]
    fn test_other_statuses_ignore_courier_fields() {
        assert_eq!(
            form("delivered", "", "").to_update(now()).unwrap(),
            StatusUpdate::Delivered
        );
        assert_eq!(
            form("processing", "DPD", "x").to_update(now()).unwrap(),
            StatusUpdate::Processing
        );
        assert!(form("lost", "", "").to_update(now()).is_err());
    }

    #[test]
    fn test_filter() {
        let orders: Vec<Order> = serde_json::from_value(json!([
            { "_id": "aaa111", "userId": "u1", "orderStatus": "processing" },
            { "_id": "bbb222", "userId": "u2", "orderStatus": "shipped",
              "shippingInfo": { "courierName": "DPD", "trackingNumber": "TRK9" } },
            { "_id": "ccc333", "userId": "u2", "orderStatus": "delivered" }
        ]))
        .unwrap();

        let by_user = OrderFilter {
            search: "U2".to_string(),
            ..OrderFilter::default()
        };
        assert_eq!(by_user.apply(&orders).len(), 2);

        let by_tracking = OrderFilter {
            search: "trk".to_string(),
            ..OrderFilter::default()
        };
        assert_eq!(by_tracking.apply(&orders)[0].id.as_str(), "bbb222");

        let by_status = OrderFilter {
            status: Some("delivered".to_string()),
            ..OrderFilter::default()
        };
        assert_eq!(by_status.apply(&orders).len(), 1);

        let blank = OrderFilter {
            status: Some(String::new()),
            ..OrderFilter::default()
        };
        assert!(!blank.is_active());
        assert_eq!(blank.apply(&orders).len(), 3);
    }
}
