//! Numeric input parsing
//!
//! Batch must/adjustment fields and ingredient quantities are free-form
//! numeric text, entered with either a decimal dot or a decimal comma.
//! This module is the single place that turns that text into floats.
//!
//! Locale assumption (documented, not inferred): a comma is always a
//! decimal separator, never a thousands separator. Only the first comma
//! is normalized; text with more than one comma will not parse.

use serde::{Deserialize, Deserializer};

/// Normalize user-entered numeric text for storage.
///
/// Swaps the decimal comma for a dot, prefixes a bare leading "." with
/// "0", and returns an empty string when the result is not a number.
/// The returned string is what gets stored on the batch.
pub fn normalize_numeric_input(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut normalized = trimmed.replacen(',', ".", 1);
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }

    if normalized.parse::<f64>().is_ok() {
        normalized
    } else {
        String::new()
    }
}

/// Parse numeric text to a float, normalizing the decimal comma.
///
/// Returns None for empty or unparseable text.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replacen(',', ".", 1).parse::<f64>().ok()
}

/// Parse numeric text to a float, coercing empty/unparseable text to 0.
///
/// This is the computation-side contract: degenerate inputs never fail,
/// they contribute nothing.
pub fn parse_or_zero(value: &str) -> f64 {
    parse_decimal(value).unwrap_or(0.0)
}

/// Numeric-text JSON value: files written by the original application mix
/// plain numbers and strings for the same fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericText {
    Text(String),
    Number(serde_json::Number),
    Missing,
}

/// Deserialize a number-or-string-or-null JSON value into numeric text.
///
/// Pair with `#[serde(default)]` so absent keys become empty text too.
pub fn de_numeric_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumericText::deserialize(deserializer)? {
        NumericText::Text(s) => s,
        NumericText::Number(n) => n.to_string(),
        NumericText::Missing => String::new(),
    })
}

/// Deserialize a number-or-string-or-null JSON value into a float,
/// coercing unparseable text to 0.
pub fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumericText::deserialize(deserializer)? {
        NumericText::Text(s) => {
            let parsed = parse_decimal(&s);
            if parsed.is_none() && !s.trim().is_empty() {
                tracing::warn!("Unparseable numeric text \"{}\", coercing to 0", s);
            }
            parsed.unwrap_or(0.0)
        }
        NumericText::Number(n) => n.as_f64().unwrap_or(0.0),
        NumericText::Missing => 0.0,
    })
}

/// Deserialize a number-or-string-or-null JSON value into an optional
/// float. Empty or unparseable text becomes None, not 0; a reading that
/// was never taken must stay absent.
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumericText::deserialize(deserializer)? {
        NumericText::Text(s) => parse_decimal(&s),
        NumericText::Number(n) => n.as_f64(),
        NumericText::Missing => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_comma_as_decimal() {
        assert_eq!(normalize_numeric_input("3,5"), "3.5");
        assert_eq!(normalize_numeric_input("1,090"), "1.090");
        assert_eq!(normalize_numeric_input("22"), "22");
    }

    #[test]
    fn test_normalize_leading_dot_gets_zero_prefix() {
        assert_eq!(normalize_numeric_input(".5"), "0.5");
        assert_eq!(normalize_numeric_input(",5"), "0.5");
    }

    #[test]
    fn test_normalize_rejects_non_numeric() {
        assert_eq!(normalize_numeric_input("abc"), "");
        assert_eq!(normalize_numeric_input(""), "");
        assert_eq!(normalize_numeric_input("   "), "");
        // Two commas: only the first is a decimal separator, so this
        // does not parse
        assert_eq!(normalize_numeric_input("1,234,5"), "");
    }

    #[test]
    fn test_normalize_keeps_negative_values() {
        assert_eq!(normalize_numeric_input("-0,5"), "-0.5");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1,090"), Some(1.090));
        assert_eq!(parse_decimal("3.5"), Some(3.5));
        assert_eq!(parse_decimal(" 22 "), Some(22.0));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn test_parse_or_zero_coerces_garbage() {
        assert_eq!(parse_or_zero("abc"), 0.0);
        assert_eq!(parse_or_zero(""), 0.0);
        assert_eq!(parse_or_zero("5,25"), 5.25);
    }

    #[derive(serde::Deserialize)]
    struct LenientRow {
        #[serde(default, deserialize_with = "de_numeric_text")]
        text: String,
        #[serde(default, deserialize_with = "de_lenient_f64")]
        value: f64,
        #[serde(default, deserialize_with = "de_opt_f64")]
        reading: Option<f64>,
    }

    #[test]
    fn test_de_numeric_text_accepts_numbers_and_strings() {
        let row: LenientRow = serde_json::from_str(r#"{"text": 20, "value": "1,090"}"#).unwrap();
        assert_eq!(row.text, "20");
        assert_eq!(row.value, 1.090);

        let row: LenientRow = serde_json::from_str(r#"{"text": "3,5", "value": 22}"#).unwrap();
        assert_eq!(row.text, "3,5");
        assert_eq!(row.value, 22.0);
    }

    #[test]
    fn test_de_adapters_tolerate_null_and_missing() {
        let row: LenientRow = serde_json::from_str(r#"{"text": null, "value": null}"#).unwrap();
        assert_eq!(row.text, "");
        assert_eq!(row.value, 0.0);
        assert_eq!(row.reading, None);

        let row: LenientRow = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(row.text, "");
        assert_eq!(row.value, 0.0);
    }

    #[test]
    fn test_de_opt_f64_keeps_absent_readings_absent() {
        let row: LenientRow = serde_json::from_str(r#"{"reading": "1,050"}"#).unwrap();
        assert_eq!(row.reading, Some(1.050));

        let row: LenientRow = serde_json::from_str(r#"{"reading": 22}"#).unwrap();
        assert_eq!(row.reading, Some(22.0));

        let row: LenientRow = serde_json::from_str(r#"{"reading": ""}"#).unwrap();
        assert_eq!(row.reading, None);
    }
}
