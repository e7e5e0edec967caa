//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Last eight characters of a backend ID, upper-cased, for compact tables.
///
/// Usage in templates: `{{ product.id|short_id }}`
#[askama::filter_fn]
pub fn short_id(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(short(&value.to_string()))
}

/// Singular or plural noun for a count, e.g. `1 item`, `3 items`.
///
/// Usage in templates: `{{ cart.count()|items }}`
#[askama::filter_fn]
pub fn items(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let count = value.to_string();
    let noun = if count == "1" { "item" } else { "items" };
    Ok(format!("{count} {noun}"))
}

fn short(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars.get(start..).unwrap_or_default().iter().collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short() {
        assert_eq!(short("650a1b2c3d4e5f6a7b8c9d0e"), "7B8C9D0E");
        assert_eq!(short("abc"), "ABC");
    }
}
