//! UK postcode normalization and validation.
//!
//! Postcodes are normalized (trimmed, uppercased, all whitespace removed)
//! before validation, so `" sw1a 1aa "` and `"SW1A1AA"` are the same
//! postcode. Only normalized values are ever sent to the lookup service.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static POSTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}[0-9R][0-9A-Z]?\s?[0-9][A-Z]{2}$").expect("Invalid regex")
});

/// Shortest input worth sending to the lookup service as the user types.
const MIN_SEARCH_LENGTH: usize = 6;

/// Errors that can occur when parsing a [`Postcode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PostcodeError {
    /// The input is blank.
    #[error("Postcode is required")]
    Empty,
    /// The input does not match the UK postcode format.
    #[error("Please enter a valid UK postcode")]
    Invalid,
}

/// Normalize a postcode: trim, uppercase, and strip all whitespace.
///
/// ```
/// use highstreet_core::normalize_postcode;
///
/// assert_eq!(normalize_postcode(" sw1a 1aa "), "SW1A1AA");
/// ```
#[must_use]
pub fn normalize_postcode(input: &str) -> String {
    input
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// A validated, normalized UK postcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Postcode(String);

impl Postcode {
    /// Normalize and validate a postcode.
    ///
    /// # Errors
    ///
    /// Returns `PostcodeError::Empty` for blank input and
    /// `PostcodeError::Invalid` when the normalized value does not match the
    /// UK postcode pattern.
    pub fn parse(input: &str) -> Result<Self, PostcodeError> {
        let normalized = normalize_postcode(input);
        if normalized.is_empty() {
            return Err(PostcodeError::Empty);
        }
        if !POSTCODE_RE.is_match(&normalized) {
            return Err(PostcodeError::Invalid);
        }
        Ok(Self(normalized))
    }

    /// Whether raw keyboard input is long enough and valid enough to search.
    #[must_use]
    pub fn is_search_ready(input: &str) -> bool {
        input.trim().len() >= MIN_SEARCH_LENGTH && Self::parse(input).is_ok()
    }

    /// The normalized form, e.g. `SW1A1AA`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The conventional display form with a space before the inward code,
    /// e.g. `SW1A 1AA`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let split = self.0.len().saturating_sub(3);
        let (outward, inward) = self.0.split_at(split);
        format!("{outward} {inward}")
    }
}

impl std::fmt::Display for Postcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_spaces_and_uppercases() {
        assert_eq!(normalize_postcode("SW1A 1AA"), "SW1A1AA");
        assert_eq!(normalize_postcode("  ec1a  1bb\t"), "EC1A1BB");
    }

    #[test]
    fn test_parse_accepts_valid_formats() {
        for input in ["SW1A 1AA", "sw1a1aa", "M1 1AE", "B33 8TH", "CR2 6XH", "DN55 1PT", "W1A 0AX"] {
            assert!(Postcode::parse(input).is_ok(), "{input} should be valid");
        }
    }

    #[test]
    fn test_parse_rejects_invalid_formats() {
        for input in ["12345", "SW1A", "SW1A 1A", "QQQ 1AA", "SW1A-1AA", "1AA SW1"] {
            assert_eq!(
                Postcode::parse(input),
                Err(PostcodeError::Invalid),
                "{input} should be invalid"
            );
        }
        assert_eq!(Postcode::parse("   "), Err(PostcodeError::Empty));
    }

    #[test]
    fn test_formatted() {
        let postcode = Postcode::parse("sw1a1aa").unwrap();
        assert_eq!(postcode.as_str(), "SW1A1AA");
        assert_eq!(postcode.formatted(), "SW1A 1AA");
    }

    #[test]
    fn test_search_ready() {
        assert!(Postcode::is_search_ready("SW1A 1AA"));
        assert!(!Postcode::is_search_ready("M1 1A"));
        assert!(!Postcode::is_search_ready("ZZZZZZ"));
    }
}
