//! Postcode service wire types and address suggestions.

use highstreet_core::{AddressInput, DEFAULT_COUNTRY};
use serde::{Deserialize, Serialize};

/// Envelope used by every postcode service response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    #[serde(default)]
    pub result: Option<T>,
}

/// Administrative data for a single postcode.
///
/// Only the fields used to build suggestions are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostcodeResult {
    pub postcode: String,
    #[serde(default)]
    pub admin_ward: Option<String>,
    #[serde(default)]
    pub admin_district: Option<String>,
    #[serde(default)]
    pub admin_county: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub primary_care_trust: Option<String>,
    #[serde(default)]
    pub nuts: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl PostcodeResult {
    /// Ward name, falling back to the primary care trust.
    #[must_use]
    pub fn ward(&self) -> Option<&str> {
        non_empty(self.admin_ward.as_ref()).or_else(|| non_empty(self.primary_care_trust.as_ref()))
    }

    /// District name, falling back to the NUTS area.
    #[must_use]
    pub fn district(&self) -> Option<&str> {
        non_empty(self.admin_district.as_ref()).or_else(|| non_empty(self.nuts.as_ref()))
    }

    /// County name, falling back to the region.
    #[must_use]
    pub fn county(&self) -> Option<&str> {
        non_empty(self.admin_county.as_ref()).or_else(|| non_empty(self.region.as_ref()))
    }

    /// Country, defaulting to the United Kingdom.
    #[must_use]
    pub fn country(&self) -> &str {
        non_empty(self.country.as_ref()).unwrap_or(DEFAULT_COUNTRY)
    }
}

/// An address the shopper can accept to pre-fill the address form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub id: String,
    pub street: String,
    pub city: String,
    pub county: String,
    pub postcode: String,
    pub country: String,
}

impl AddressSuggestion {
    /// The suggestion built from the searched postcode itself.
    ///
    /// The street is the ward (or district when there is no ward) and the
    /// city is the district.
    #[must_use]
    pub fn primary(result: &PostcodeResult) -> Self {
        let district = result.district().unwrap_or_default();
        Self {
            id: "primary".to_string(),
            street: result.ward().unwrap_or(district).to_string(),
            city: district.to_string(),
            county: result.county().unwrap_or_default().to_string(),
            postcode: result.postcode.clone(),
            country: result.country().to_string(),
        }
    }

    /// A suggestion for an autocomplete candidate, filling gaps from the
    /// primary result.
    #[must_use]
    pub fn candidate(
        index: usize,
        candidate: &str,
        result: &PostcodeResult,
        primary: &PostcodeResult,
    ) -> Self {
        let postcode = if result.postcode.trim().is_empty() {
            primary.postcode.clone()
        } else {
            result.postcode.clone()
        };
        Self {
            id: format!("candidate-{index}"),
            street: candidate.to_string(),
            city: non_empty(result.admin_district.as_ref())
                .or_else(|| primary.district())
                .unwrap_or_default()
                .to_string(),
            county: non_empty(result.admin_county.as_ref())
                .or_else(|| primary.county())
                .unwrap_or_default()
                .to_string(),
            postcode,
            country: non_empty(result.country.as_ref())
                .unwrap_or_else(|| primary.country())
                .to_string(),
        }
    }

    /// Fill an address form from this suggestion, clearing the house number.
    ///
    /// `searched` is the postcode the shopper typed, used when the
    /// suggestion carries none.
    pub fn apply_to(&self, address: &mut AddressInput, searched: &str) {
        address.house_number.clear();
        address.street.clone_from(&self.street);
        address.city.clone_from(&self.city);
        address.county.clone_from(&self.county);
        address.postcode = if self.postcode.is_empty() {
            searched.to_string()
        } else {
            self.postcode.clone()
        };
        address.country.clone_from(&self.country);
    }

    /// One-line summary for the suggestion list.
    #[must_use]
    pub fn summary(&self) -> String {
        [&self.street, &self.city, &self.county, &self.postcode]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn westminster() -> PostcodeResult {
        serde_json::from_value(json!({
            "postcode": "SW1A 1AA",
            "admin_ward": "St James's",
            "admin_district": "Westminster",
            "admin_county": null,
            "region": "London",
            "country": "England",
            "longitude": -0.141588
        }))
        .unwrap()
    }

    #[test]
    fn test_primary_suggestion() {
        let suggestion = AddressSuggestion::primary(&westminster());
        assert_eq!(suggestion.street, "St James's");
        assert_eq!(suggestion.city, "Westminster");
        assert_eq!(suggestion.county, "London");
        assert_eq!(suggestion.postcode, "SW1A 1AA");
        assert_eq!(suggestion.country, "England");
    }

    #[test]
    fn test_primary_without_ward_uses_district() {
        let result = PostcodeResult {
            postcode: "M1 1AE".to_string(),
            admin_district: Some("Manchester".to_string()),
            ..PostcodeResult::default()
        };
        let suggestion = AddressSuggestion::primary(&result);
        assert_eq!(suggestion.street, "Manchester");
        assert_eq!(suggestion.country, "United Kingdom");
    }

    #[test]
    fn test_candidate_fills_from_primary() {
        let candidate = PostcodeResult {
            postcode: "SW1A 1AB".to_string(),
            ..PostcodeResult::default()
        };
        let suggestion = AddressSuggestion::candidate(0, "SW1A 1AB", &candidate, &westminster());
        assert_eq!(suggestion.id, "candidate-0");
        assert_eq!(suggestion.street, "SW1A 1AB");
        assert_eq!(suggestion.city, "Westminster");
        assert_eq!(suggestion.county, "London");
        assert_eq!(suggestion.country, "England");
    }

    #[test]
    fn test_summary_skips_blanks() {
        let suggestion = AddressSuggestion {
            id: "primary".to_string(),
            street: "St James's".to_string(),
            city: "Westminster".to_string(),
            county: String::new(),
            postcode: "SW1A 1AA".to_string(),
            country: "England".to_string(),
        };
        assert_eq!(suggestion.summary(), "St James's, Westminster, SW1A 1AA");
    }
}
