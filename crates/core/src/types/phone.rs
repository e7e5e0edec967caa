//! UK mobile phone number validation.

use std::sync::LazyLock;

use regex::Regex;

static UK_MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+44\s?7\d{3}|\(?07\d{3}\)?)\s?\d{3}\s?\d{3}$").expect("Invalid regex")
});

/// Errors that can occur when parsing a [`UkPhone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input is blank.
    #[error("Phone number is required")]
    Empty,
    /// The input is not a UK mobile number.
    #[error("Please enter a valid UK phone number")]
    Invalid,
}

/// A UK mobile number, kept exactly as the customer typed it (trimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UkPhone(String);

impl UkPhone {
    /// Validate a UK mobile number such as `07700 900123` or `+44 7700 900123`.
    ///
    /// # Errors
    ///
    /// Returns `PhoneError::Empty` for blank input and `PhoneError::Invalid`
    /// when the number does not match the UK mobile format.
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }
        if !UK_MOBILE_RE.is_match(trimmed) {
            return Err(PhoneError::Invalid);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The trimmed number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_numbers() {
        for input in [
            "07700900123",
            "07700 900123",
            "07700 900 123",
            "(07700) 900123",
            "+447700900123",
            "+44 7700 900 123",
        ] {
            assert!(UkPhone::parse(input).is_ok(), "{input} should be valid");
        }
    }

    #[test]
    fn test_invalid_numbers() {
        assert_eq!(UkPhone::parse(""), Err(PhoneError::Empty));
        for input in ["02079460000", "7700900123", "+33 612345678", "0770090012"] {
            assert_eq!(
                UkPhone::parse(input),
                Err(PhoneError::Invalid),
                "{input} should be invalid"
            );
        }
    }
}
