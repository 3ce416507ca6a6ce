//! Value synthesis through an external text generation service
//!
//! The service gets the exact field names and a handful of formatting rules,
//! and must answer with a flat JSON object keyed by those names. Values are
//! not validated here; [`crate::fill::normalize`] cleans them up.

pub mod openai;

use crate::error::{Error, Result};
use crate::values::{scalar_to_string, FieldValueMap};
use async_trait::async_trait;
use std::collections::HashSet;

pub use openai::OpenAiGenerator;

/// Produces one candidate value per requested field name
#[async_trait]
pub trait ValueGenerator: Send + Sync {
    /// Generate values for `field_names`.
    ///
    /// # Errors
    ///
    /// [`Error::Generation`] when the call fails or times out,
    /// [`Error::MalformedGeneration`] when the answer is not a flat mapping.
    async fn generate(&self, field_names: &[String]) -> Result<FieldValueMap>;
}

/// Prompt asking for one value per field, with formatting hints
pub fn build_prompt(field_names: &[String]) -> String {
    let quoted = field_names
        .iter()
        .map(|name| serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Generate realistic sample data for a form with the fields listed below.

Use these EXACT field names as JSON keys, keeping their spacing and capitalization:
{quoted}

Rules:
- Provide a value for every field in the list; do not skip any.
- Month and Day fields use two digits (01-12, 01-31).
- Fields holding a full date (for example "Sell date 1") use MM/DD/YYYY.
- State fields use two-letter codes such as "CA", "NY" or "TX".
- Zip code fields use five digits such as "90210".
- Use realistic but fake names, addresses and phone numbers.
- A field ending in " 2" describes a second person or item. Fill it only when a genuinely different second entity exists, otherwise use "".

Return ONLY a JSON object containing every field name above.
Example: {{"Name": "John Smith", "State": "CA", "Month": "03", "Day": "15", "Zip": "90210", "Date": "03/15/2025"}}"#
    )
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse generated content into a value map.
///
/// A returned key that is not one of `requested` but equals exactly one
/// requested name once whitespace is trimmed and collapsed is re-keyed to
/// that name, unless the exact name was also returned.
pub fn parse_generated_values(content: &str, requested: &[String]) -> Result<FieldValueMap> {
    let parsed: serde_json::Value =
        serde_json::from_str(content).map_err(|e| Error::MalformedGeneration {
            reason: e.to_string(),
        })?;

    let object = parsed.as_object().ok_or_else(|| Error::MalformedGeneration {
        reason: "expected a JSON object".to_string(),
    })?;

    let requested_set: HashSet<&str> = requested.iter().map(String::as_str).collect();
    let returned_exact: HashSet<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|k| requested_set.contains(k))
        .collect();

    let mut values = FieldValueMap::new();
    for (key, value) in object {
        let value = scalar_to_string(value).ok_or_else(|| Error::MalformedGeneration {
            reason: format!("value for \"{}\" is not a scalar", key),
        })?;

        let name = if requested_set.contains(key.as_str()) {
            key.clone()
        } else {
            reconcile_name(key, requested, &returned_exact).unwrap_or_else(|| key.clone())
        };
        values.insert(name, value);
    }

    Ok(values)
}

fn reconcile_name(key: &str, requested: &[String], taken: &HashSet<&str>) -> Option<String> {
    let collapsed = collapse_whitespace(key);
    let mut candidates = requested
        .iter()
        .filter(|r| collapse_whitespace(r) == collapsed && !taken.contains(r.as_str()));

    let candidate = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }

    tracing::debug!(returned = key, requested = %candidate, "re-keyed generated value");
    Some(candidate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prompt_lists_exact_names() {
        let prompt = build_prompt(&names(&["Print seller's name", "Buyer \"nick\" name"]));
        assert!(prompt.contains("\"Print seller's name\"\n\"Buyer \\\"nick\\\" name\""));
        assert!(prompt.contains("MM/DD/YYYY"));
        assert!(prompt.contains("ending in \" 2\""));
    }

    #[test]
    fn test_parse_flat_object() {
        let values = parse_generated_values(
            r#"{"Month": "March", "Day": 15, "Agree": true, "Notes": null}"#,
            &names(&["Month", "Day", "Agree", "Notes"]),
        )
        .unwrap();

        let pairs: Vec<(&str, &str)> = values.iter().collect();
        assert_eq!(
            pairs,
            vec![("Month", "March"), ("Day", "15"), ("Agree", "true"), ("Notes", "")]
        );
    }

    #[test]
    fn test_parse_rejects_non_object_and_nested() {
        let requested = names(&["Name"]);
        for content in ["[\"a\"]", "\"text\"", "not json", r#"{"Name": {"first": "Jo"}}"#] {
            assert!(
                matches!(
                    parse_generated_values(content, &requested),
                    Err(Error::MalformedGeneration { .. })
                ),
                "content {:?} should be rejected",
                content
            );
        }
    }

    #[test]
    fn test_whitespace_variants_rekeyed() {
        let values = parse_generated_values(
            r#"{" Seller  State": "NV", "Buyer zip": "10001"}"#,
            &names(&["Seller State", "Buyer zip"]),
        )
        .unwrap();

        assert_eq!(values.get("Seller State"), Some("NV"));
        assert!(!values.contains_key(" Seller  State"));
    }

    #[test]
    fn test_whitespace_variant_does_not_shadow_exact_key() {
        let values = parse_generated_values(
            r#"{"Seller State": "CA", "Seller  State": "NV"}"#,
            &names(&["Seller State"]),
        )
        .unwrap();

        assert_eq!(values.get("Seller State"), Some("CA"));
        assert_eq!(values.get("Seller  State"), Some("NV"));
    }

    #[test]
    fn test_case_differences_not_reconciled() {
        let values =
            parse_generated_values(r#"{"seller state": "NV"}"#, &names(&["Seller State"])).unwrap();
        assert!(!values.contains_key("Seller State"));
    }
}
