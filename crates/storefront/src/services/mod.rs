//! Business logic services for storefront.
//!
//! Route handlers stay thin: they extract the session and form data, call a
//! service, and render the result. Services own the presentation-side rules
//! (local validation, cart arithmetic, checkout steps) and wrap the backend
//! calls that go with them.
//!
//! # Services
//!
//! - `auth` - Login and registration form handling
//! - `cart` - Cart totals and mutate-then-refetch operations
//! - `checkout` - Checkout draft state machine and order placement
//! - `addresses` - Address book guards and the default-address invariant
//! - `catalog` - Product and category forms, bulk actions
//! - `orders` - Admin status changes and order list filtering

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use addresses::{AddressBook, AddressError};
pub use auth::{AuthError, AuthService, LoginForm, RegisterForm};
pub use cart::{Cart, CartError, CartService};
pub use catalog::{BulkAction, CatalogError, CatalogService, CategoryForm, ProductForm};
pub use checkout::{CheckoutDraft, CheckoutError, CheckoutService, CheckoutStep, OrderSummary};
pub use orders::{OrderFilter, StatusForm};
