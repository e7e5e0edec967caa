//! Field-scoped validation errors.
//!
//! Form validation never stops at the first problem: every field is checked
//! and each failing field gets its own message, so forms can annotate the
//! exact input that needs attention.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Validation messages keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Create an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field, replacing any earlier message.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Record an error only if none is present for the field yet.
    pub fn insert_first(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_insert_with(|| message.into());
    }

    /// Clear the error for a single field.
    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }

    /// The message for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether the field has an error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Whether there are no errors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(field, message)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Turn the collected errors into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `self` when any field failed validation.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_per_field() {
        let mut errors = FieldErrors::new();
        errors.insert("name", "Full name is required");
        errors.insert_first("name", "ignored");
        errors.insert("city", "City is required");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some("Full name is required"));
        assert!(errors.has("city"));
        assert!(!errors.has("county"));

        errors.clear("city");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(FieldErrors::new().into_result(5), Ok(5));

        let mut errors = FieldErrors::new();
        errors.insert("price", "Valid price is required");
        assert!(errors.into_result(()).is_err());
    }
}
