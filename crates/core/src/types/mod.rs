//! Core types for Highstreet.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod phone;
pub mod postcode;
pub mod price;
pub mod status;
pub mod validation;

pub use address::{AddressInput, DEFAULT_COUNTRY, join_house_number, split_house_number};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{PhoneError, UkPhone};
pub use postcode::{Postcode, PostcodeError, normalize_postcode};
pub use price::{Price, line_subtotal};
pub use status::*;
pub use validation::FieldErrors;
