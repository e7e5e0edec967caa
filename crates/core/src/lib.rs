//! Highstreet Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront binary and its
//! integration tests:
//! - identifiers for backend entities (`ProductId`, `OrderId`, ...)
//! - GBP prices and cart arithmetic
//! - order, payment, and stock statuses
//! - UK postcode and phone validation
//! - address form validation with field-scoped errors
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. Everything here can be unit tested without a backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
