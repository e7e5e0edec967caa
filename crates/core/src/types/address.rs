//! Address form input and validation.
//!
//! Used by checkout (new shipping address) and the account address book.
//! The backend stores a single `street` line; the form splits an optional
//! house number off the front so postcode suggestions can replace the street
//! without losing it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{FieldErrors, Postcode, PostcodeError, UkPhone};

static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+[A-Za-z]?)\s+(.+)$").expect("Invalid regex"));

/// Country used when the form leaves it blank.
pub const DEFAULT_COUNTRY: &str = "United Kingdom";

fn default_country() -> String {
    DEFAULT_COUNTRY.to_owned()
}

/// A new or edited address as typed into a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Default for AddressInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            house_number: String::new(),
            street: String::new(),
            city: String::new(),
            county: String::new(),
            postcode: String::new(),
            country: default_country(),
            is_default: false,
        }
    }
}

impl AddressInput {
    /// Check every required field, collecting one message per failing field.
    ///
    /// Required: name, UK mobile phone, street, city, county, UK postcode.
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.insert("name", "Full name is required");
        }
        if let Err(e) = UkPhone::parse(&self.phone) {
            errors.insert("phone", e.to_string());
        }
        if self.street.trim().is_empty() {
            errors.insert("street", "Street address is required");
        }
        if self.city.trim().is_empty() {
            errors.insert("city", "City is required");
        }
        if self.county.trim().is_empty() {
            errors.insert("county", "County is required");
        }
        match Postcode::parse(&self.postcode) {
            Ok(_) => {}
            Err(PostcodeError::Empty) => errors.insert("postcode", "Postcode is required"),
            Err(e @ PostcodeError::Invalid) => errors.insert("postcode", e.to_string()),
        }

        errors
    }

    /// The street line sent to the backend, prefixed with the house number
    /// when one was entered.
    #[must_use]
    pub fn full_street(&self) -> String {
        join_house_number(&self.house_number, &self.street)
    }

    /// Build form input from a stored street line, splitting off a leading
    /// house number.
    #[must_use]
    pub fn with_street_line(mut self, street_line: &str) -> Self {
        let (house_number, street) = split_house_number(street_line);
        self.house_number = house_number;
        self.street = street;
        self
    }

    /// Clear the fields a postcode suggestion fills in, keeping the postcode.
    pub fn clear_for_manual_entry(&mut self, postcode: &str) {
        self.house_number.clear();
        self.street.clear();
        self.city.clear();
        self.county.clear();
        postcode.clone_into(&mut self.postcode);
    }
}

/// Join an optional house number onto a street name.
#[must_use]
pub fn join_house_number(house_number: &str, street: &str) -> String {
    let house_number = house_number.trim();
    let street = street.trim();
    if house_number.is_empty() {
        street.to_owned()
    } else {
        format!("{house_number} {street}")
    }
}

/// Split `"10 Main Street"` into `("10", "Main Street")`.
///
/// The house number is digits with at most one letter suffix (`221B`).
/// Streets without a leading number come back unchanged with an empty house
/// number.
#[must_use]
pub fn split_house_number(street_line: &str) -> (String, String) {
    HOUSE_NUMBER_RE.captures(street_line.trim()).map_or_else(
        || (String::new(), street_line.trim().to_owned()),
        |caps| {
            let number = caps.get(1).map_or("", |m| m.as_str()).trim().to_owned();
            let street = caps.get(2).map_or("", |m| m.as_str()).trim().to_owned();
            (number, street)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> AddressInput {
        AddressInput {
            name: "Ada Lovelace".to_owned(),
            phone: "07700 900123".to_owned(),
            house_number: "10".to_owned(),
            street: "Downing Street".to_owned(),
            city: "London".to_owned(),
            county: "Greater London".to_owned(),
            postcode: "SW1A 2AA".to_owned(),
            ..AddressInput::default()
        }
    }

    #[test]
    fn test_valid_input_has_no_errors() {
        assert!(valid_input().validate().is_empty());
    }

    #[test]
    fn test_every_required_field_is_reported() {
        let errors = AddressInput::default().validate();
        for field in ["name", "phone", "street", "city", "county", "postcode"] {
            assert!(errors.has(field), "missing error for {field}");
        }
        assert_eq!(errors.get("postcode"), Some("Postcode is required"));
        assert_eq!(errors.get("phone"), Some("Phone number is required"));
    }

    #[test]
    fn test_invalid_phone_and_postcode() {
        let input = AddressInput {
            phone: "020 7946 0000".to_owned(),
            postcode: "NOT A CODE".to_owned(),
            ..valid_input()
        };
        let errors = input.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("phone"), Some("Please enter a valid UK phone number"));
        assert_eq!(errors.get("postcode"), Some("Please enter a valid UK postcode"));
    }

    #[test]
    fn test_whitespace_only_fields_are_missing() {
        let input = AddressInput {
            street: "   ".to_owned(),
            ..valid_input()
        };
        assert_eq!(input.validate().get("street"), Some("Street address is required"));
    }

    #[test]
    fn test_full_street() {
        assert_eq!(valid_input().full_street(), "10 Downing Street");
        let no_number = AddressInput {
            house_number: String::new(),
            ..valid_input()
        };
        assert_eq!(no_number.full_street(), "Downing Street");
    }

    #[test]
    fn test_split_house_number() {
        assert_eq!(
            split_house_number("10 Main Street"),
            ("10".to_owned(), "Main Street".to_owned())
        );
        assert_eq!(
            split_house_number("221B Baker Street"),
            ("221B".to_owned(), "Baker Street".to_owned())
        );
        assert_eq!(
            split_house_number("12 A Road"),
            ("12".to_owned(), "A Road".to_owned())
        );
        assert_eq!(
            split_house_number("Rose Cottage"),
            (String::new(), "Rose Cottage".to_owned())
        );
    }

    #[test]
    fn test_split_then_join_keeps_street() {
        for line in ["10 Main Street", "221B Baker Street", "7 Ash Lane", "Rose Cottage"] {
            let (house_number, street) = split_house_number(line);
            let input = AddressInput {
                house_number,
                street,
                ..valid_input()
            };
            assert_eq!(input.full_street(), line);
        }
    }

    #[test]
    fn test_manual_entry_keeps_postcode() {
        let mut input = valid_input();
        input.clear_for_manual_entry("SW1A 1AA");
        assert!(input.street.is_empty());
        assert!(input.city.is_empty());
        assert_eq!(input.postcode, "SW1A 1AA");
        assert_eq!(input.name, "Ada Lovelace");
    }
}
