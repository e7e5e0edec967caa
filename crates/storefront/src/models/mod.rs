//! Session-held models for the storefront.
//!
//! Persisted entities (products, carts, orders, addresses) belong to the
//! backend and live in [`crate::api::types`]. What lives here is the
//! per-session state: who is logged in and the flash notifications
//! waiting to be shown.

pub mod session;

pub use session::{CurrentUser, Flash, FlashKind, keys as session_keys};
