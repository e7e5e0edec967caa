//! Wire types for the backend REST API.
//!
//! The backend speaks camelCase JSON with Mongo-style `_id` identifiers and
//! money as plain JSON numbers. Fields the backend may omit are defaulted so
//! a sparse document still renders.

use chrono::{DateTime, Utc};
use highstreet_core::{
    AddressId, AddressInput, CategoryId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price,
    ProductId, StockStatus, UserId,
};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Format an optional timestamp as a UK date, e.g. `2 June 2025`.
#[must_use]
pub fn date_label(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%-d %B %Y").to_string())
}

// =============================================================================
// Auth & Users
// =============================================================================

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Response from `/auth/login` and `/auth/register`.
///
/// Registration may omit the token, in which case the caller logs in with
/// the same credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Profile returned by `GET /user/profile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Registration date for the profile page.
    #[must_use]
    pub fn member_since(&self) -> String {
        date_label(self.created_at)
    }

    /// Name to greet the user with.
    ///
    /// Older accounts carry first/last name instead of a single name field.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self.email.clone()
        } else {
            joined
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// An embedded image: content type plus base64 data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub content_type: String,
    pub data: String,
}

impl ProductImage {
    /// A `data:` URI for use in an `img` tag.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.data)
    }
}

/// A product as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_true")]
    pub availability: bool,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Stock status derived from the stock count.
    #[must_use]
    pub const fn stock_status(&self) -> StockStatus {
        StockStatus::from_stock(self.stock)
    }

    /// Whether the product can be added to a cart at all.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.availability && self.stock > 0
    }

    /// The first image, used as the primary image.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.first()
    }
}

const fn default_true() -> bool {
    true
}

/// A page of products from `GET /products`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub total: u32,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default = "default_page")]
    pub total_pages: u32,
}

const fn default_page() -> u32 {
    1
}

/// Product sort fields accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Name,
    Price,
    Stock,
}

impl ProductSort {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::Name => "name",
            Self::Price => "price",
            Self::Stock => "stock",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Query parameters for `GET /products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<ProductSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            page: 1,
            limit: 20,
            sort: None,
            order: None,
        }
    }
}

/// Product fields sent on create and update.
///
/// Create goes out as multipart (with images); update as JSON without images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub stock: u32,
    pub availability: bool,
    pub sizes: Vec<String>,
    pub tags: Vec<String>,
}

/// An image file uploaded with a new product.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Partial product update used for the availability toggle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AvailabilityUpdate {
    pub availability: bool,
}

/// A category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub product_count: u32,
}

impl Category {
    /// Whether deleting the category is allowed.
    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        self.product_count == 0
    }
}

/// Category fields sent on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// Cart
// =============================================================================

/// Product snapshot embedded in a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub image: Option<ProductImage>,
    #[serde(default = "default_true")]
    pub availability: bool,
    #[serde(default)]
    pub stock: Option<u32>,
}

/// A line in the user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub product: Option<CartProduct>,
}

impl CartItem {
    /// Unit price, zero when the product snapshot is missing.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.product.as_ref().map_or(Price::ZERO, |p| p.price)
    }

    /// Line subtotal.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        highstreet_core::line_subtotal(self.unit_price(), self.quantity)
    }

    /// Product name, empty when the snapshot is missing.
    #[must_use]
    pub fn name(&self) -> &str {
        self.product.as_ref().map_or("", |p| p.name.as_str())
    }
}

/// Body for `POST /cart` (add and set quantity).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

// =============================================================================
// Addresses
// =============================================================================

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "_id")]
    pub id: AddressId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Load the address into form input, splitting off the house number.
    #[must_use]
    pub fn to_input(&self) -> AddressInput {
        AddressInput {
            name: self.name.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
            is_default: self.is_default,
            ..AddressInput::default()
        }
        .with_street_line(&self.street)
    }

    /// Snapshot stored on an order.
    #[must_use]
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            name: self.name.clone(),
            phone: self.phone.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
        }
    }
}

/// Body for creating or updating an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub county: String,
    pub postcode: String,
    pub country: String,
    pub is_default: bool,
}

impl From<&AddressInput> for AddressPayload {
    fn from(input: &AddressInput) -> Self {
        let postcode = highstreet_core::Postcode::parse(&input.postcode)
            .map_or_else(|_| input.postcode.trim().to_string(), |p| p.formatted());
        let country = if input.country.trim().is_empty() {
            highstreet_core::DEFAULT_COUNTRY.to_string()
        } else {
            input.country.trim().to_string()
        };
        Self {
            name: input.name.trim().to_string(),
            phone: input.phone.trim().to_string(),
            street: input.full_street(),
            city: input.city.trim().to_string(),
            county: input.county.trim().to_string(),
            postcode,
            country,
            is_default: input.is_default,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressEnvelope {
    pub address: Address,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressListEnvelope {
    #[serde(default)]
    pub addresses: Vec<Address>,
}

// =============================================================================
// Orders
// =============================================================================

/// Shipping address snapshot stored on an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub country: String,
}

impl From<&AddressPayload> for ShippingAddress {
    fn from(payload: &AddressPayload) -> Self {
        Self {
            name: payload.name.clone(),
            phone: payload.phone.clone(),
            street: payload.street.clone(),
            city: payload.city.clone(),
            county: payload.county.clone(),
            postcode: payload.postcode.clone(),
            country: payload.country.clone(),
        }
    }
}

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    pub subtotal: Price,
}

/// Courier details recorded when an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(default)]
    pub courier_name: String,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
}

impl ShippingInfo {
    #[must_use]
    pub fn shipped_on(&self) -> String {
        date_label(self.shipped_at)
    }
}

/// The customer on an order: a bare ID, or a populated user document on
/// admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderCustomer {
    Id(UserId),
    User {
        #[serde(rename = "_id")]
        id: UserId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
}

impl OrderCustomer {
    /// The customer's user ID.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        match self {
            Self::Id(id) | Self::User { id, .. } => id,
        }
    }

    /// Best available label for the customer.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::User { id, name, email } => name
                .clone()
                .or_else(|| email.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }
}

/// An order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub user_id: Option<OrderCustomer>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: Price,
    #[serde(default)]
    pub tax_amount: Price,
    #[serde(default)]
    pub shipping_cost: Price,
    #[serde(default)]
    pub grand_total: Price,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub order_status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_info: Option<ShippingInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Reference shown to customers: the order number, else the last eight
    /// characters of the ID.
    #[must_use]
    pub fn reference(&self) -> String {
        if let Some(number) = self.order_number.as_deref().filter(|n| !n.is_empty()) {
            return number.to_string();
        }
        let id = self.id.as_str();
        let start = id.len().saturating_sub(8);
        id.get(start..).unwrap_or(id).to_uppercase()
    }

    /// Order date for lists and invoices.
    #[must_use]
    pub fn placed_on(&self) -> String {
        date_label(self.created_at)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether an admin search term matches the order ID, customer, or
    /// tracking number (case-insensitive substring).
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let contains = |value: &str| value.to_lowercase().contains(&term);

        contains(self.id.as_str())
            || self
                .user_id
                .as_ref()
                .is_some_and(|c| contains(c.id().as_str()) || contains(&c.label()))
            || self
                .shipping_info
                .as_ref()
                .is_some_and(|s| contains(&s.tracking_number))
    }
}

/// A page of orders from `/user/orders` or `/admin/orders`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default = "default_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub page: Option<u32>,
}

/// Body for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Price,
    pub tax_amount: Price,
    pub shipping_cost: Price,
    pub grand_total: Price,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub customer_email: String,
}

/// Response from `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// Response from `GET /orders/{id}/details`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDetailsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body for `POST /orders/{id}/success`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmPaymentRequest {
    pub session_id: String,
}

/// A validated admin status change.
///
/// Each target status carries exactly the data it needs; only `Shipped`
/// has shipping details. Serializes to `{status, shippingInfo?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Processing,
    Shipped {
        courier_name: String,
        tracking_number: String,
        shipped_at: DateTime<Utc>,
    },
    Delivered,
    Cancelled,
}

impl StatusUpdate {
    /// The target status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        match self {
            Self::Processing => OrderStatus::Processing,
            Self::Shipped { .. } => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Delivered,
            Self::Cancelled => OrderStatus::Cancelled,
        }
    }
}

impl Serialize for StatusUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shipping = match self {
            Self::Shipped {
                courier_name,
                tracking_number,
                shipped_at,
            } => Some(ShippingInfo {
                courier_name: courier_name.clone(),
                tracking_number: tracking_number.clone(),
                shipped_at: Some(*shipped_at),
            }),
            _ => None,
        };

        let mut map = serializer.serialize_map(Some(if shipping.is_some() { 2 } else { 1 }))?;
        map.serialize_entry("status", &self.status())?;
        if let Some(info) = shipping {
            map.serialize_entry("shippingInfo", &info)?;
        }
        map.end()
    }
}

// =============================================================================
// Admin
// =============================================================================

/// Headline figures on the dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    #[serde(default)]
    pub total_revenue: Price,
    #[serde(default)]
    pub total_orders: u32,
    #[serde(default)]
    pub pending_orders: u32,
}

/// Response from `GET /stats?days=`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub summary: StatsSummary,
    #[serde(default)]
    pub total_products: u32,
    #[serde(default)]
    pub total_users: u32,
    #[serde(default)]
    pub recent_orders: Vec<Order>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_date_label() {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        assert_eq!(date_label(Some(at)), "2 June 2025");
        assert_eq!(date_label(None), "-");
    }

    #[test]
    fn test_product_defaults() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "name": "Linen Shirt",
            "price": 29.99
        }))
        .unwrap();

        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Price::from_pence(2999));
        assert!(product.availability);
        assert_eq!(product.stock, 0);
        assert!(!product.is_purchasable());
        assert_eq!(product.stock_status(), StockStatus::OutOfStock);
    }

    #[test]
    fn test_cart_item_subtotal() {
        let item: CartItem = serde_json::from_value(json!({
            "productId": "p1",
            "quantity": 3,
            "product": { "name": "Mug", "price": 4.5 }
        }))
        .unwrap();
        assert_eq!(item.subtotal(), Price::from_pence(1350));

        let bare: CartItem =
            serde_json::from_value(json!({ "productId": "p2", "quantity": 1 })).unwrap();
        assert_eq!(bare.subtotal(), Price::ZERO);
    }

    #[test]
    fn test_order_customer_variants() {
        let plain: OrderCustomer = serde_json::from_value(json!("u1")).unwrap();
        assert_eq!(plain.id().as_str(), "u1");

        let populated: OrderCustomer =
            serde_json::from_value(json!({ "_id": "u2", "email": "a@b.com" })).unwrap();
        assert_eq!(populated.id().as_str(), "u2");
        assert_eq!(populated.label(), "a@b.com");
    }

    #[test]
    fn test_order_search() {
        let order: Order = serde_json::from_value(json!({
            "_id": "665f0aBC1234",
            "userId": "user-77",
            "orderStatus": "shipped",
            "shippingInfo": { "courierName": "Royal Mail", "trackingNumber": "RM123GB" }
        }))
        .unwrap();

        assert!(order.matches_search("abc1"));
        assert!(order.matches_search("USER-77"));
        assert!(order.matches_search("rm123"));
        assert!(order.matches_search("  "));
        assert!(!order.matches_search("dpd"));
        assert_eq!(order.reference(), "0ABC1234");
    }

    #[test]
    fn test_status_update_wire_format() {
        let delivered = serde_json::to_value(StatusUpdate::Delivered).unwrap();
        assert_eq!(delivered, json!({ "status": "delivered" }));

        let shipped_at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let shipped = serde_json::to_value(StatusUpdate::Shipped {
            courier_name: "DPD".to_string(),
            tracking_number: "15501234".to_string(),
            shipped_at,
        })
        .unwrap();
        assert_eq!(shipped["status"], "shipped");
        assert_eq!(shipped["shippingInfo"]["courierName"], "DPD");
        assert_eq!(shipped["shippingInfo"]["trackingNumber"], "15501234");
        assert_eq!(shipped["shippingInfo"]["shippedAt"], "2025-03-01T09:30:00Z");
    }

    #[test]
    fn test_address_payload_joins_house_number() {
        let input = AddressInput {
            name: " Ada ".to_string(),
            phone: "07700900123".to_string(),
            house_number: "10".to_string(),
            street: "Downing Street".to_string(),
            city: "London".to_string(),
            county: "Greater London".to_string(),
            postcode: "sw1a2aa".to_string(),
            country: String::new(),
            is_default: false,
        };

        let payload = AddressPayload::from(&input);
        assert_eq!(payload.name, "Ada");
        assert_eq!(payload.street, "10 Downing Street");
        assert_eq!(payload.postcode, "SW1A 2AA");
        assert_eq!(payload.country, "United Kingdom");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["isDefault"], false);
    }

    #[test]
    fn test_address_to_input_splits_street() {
        let address: Address = serde_json::from_value(json!({
            "_id": "a1",
            "street": "221B Baker Street",
            "postcode": "NW1 6XE",
            "isDefault": true
        }))
        .unwrap();

        let input = address.to_input();
        assert_eq!(input.house_number, "221B");
        assert_eq!(input.street, "Baker Street");
        assert!(input.is_default);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let profile: UserProfile = serde_json::from_value(json!({
            "_id": "u1",
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.com"
        }))
        .unwrap();
        assert_eq!(profile.display_name(), "Grace Hopper");

        let bare: UserProfile =
            serde_json::from_value(json!({ "_id": "u2", "email": "x@example.com" })).unwrap();
        assert_eq!(bare.display_name(), "x@example.com");
    }
}
