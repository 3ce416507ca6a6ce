//! Deterministic post-processing of synthesized field values
//!
//! Each rule takes a map and returns the rewritten map; [`normalize`]
//! composes them in a fixed order:
//!
//! 1. [`normalize_months`]: full month names become `01`..`12`
//! 2. [`decompose_year`]: one 4-digit year is spread over `Year-1`..`Year-4`
//! 3. [`backfill_defaults`]: well-known fields that are missing or empty get a literal
//! 4. [`suppress_duplicate_rows`]: second-entity (`" 2"`) fields are cleared
//!    when there is no distinct second seller

use crate::values::FieldValueMap;

/// Full month names and their two-digit forms
pub const MONTHS: [(&str, &str); 12] = [
    ("january", "01"),
    ("february", "02"),
    ("march", "03"),
    ("april", "04"),
    ("may", "05"),
    ("june", "06"),
    ("july", "07"),
    ("august", "08"),
    ("september", "09"),
    ("october", "10"),
    ("november", "11"),
    ("december", "12"),
];

/// Year used when no field carries a 4-digit year
pub const DEFAULT_YEAR: &str = "2025";

/// Single-digit fields receiving the year, most significant first
pub const YEAR_DIGIT_FIELDS: [&str; 4] = ["Year-1", "Year-2", "Year-3", "Year-4"];

/// Literals for well-known fields left missing or empty
pub const DEFAULT_VALUES: [(&str, &str); 8] = [
    ("Month", "03"),
    ("Day", "15"),
    ("Seller State", "CA"),
    ("Buyer State", "CA"),
    ("Sell zip", "90210"),
    ("Buyer zip", "90210"),
    ("Sell date 1", "03/15/2025"),
    ("Sell date 2", ""),
];

/// Primary seller name fields, in lookup order
pub const PRIMARY_SELLER_FIELDS: [&str; 2] = ["Print seller's name", "Seller print name 1"];

pub const SECONDARY_SELLER_FIELD: &str = "Seller print name 2";

/// Name suffix marking a second-entity row
pub const SECOND_ENTITY_SUFFIX: &str = " 2";

/// Apply every rule in order
pub fn normalize(values: FieldValueMap) -> FieldValueMap {
    let values = normalize_months(values);
    let values = decompose_year(values);
    let values = backfill_defaults(values);
    suppress_duplicate_rows(values)
}

fn month_number(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    MONTHS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, number)| *number)
}

/// Replace full month names in month-named fields with their number
pub fn normalize_months(values: FieldValueMap) -> FieldValueMap {
    values.map_values(|name, value| {
        if !name.to_lowercase().contains("month") {
            return value;
        }
        match month_number(&value) {
            Some(number) => number.to_string(),
            None => value,
        }
    })
}

fn is_year_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("yr") || lower.contains("year")
}

fn is_four_digit_year(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

/// First 4-digit value among year-named fields, in map order
pub fn canonical_year(values: &FieldValueMap) -> &str {
    values
        .iter()
        .find(|(name, value)| is_year_field(name) && is_four_digit_year(value))
        .map(|(_, value)| value)
        .unwrap_or(DEFAULT_YEAR)
}

/// Write the canonical year's digits into `Year-1`..`Year-4`
pub fn decompose_year(mut values: FieldValueMap) -> FieldValueMap {
    let year = canonical_year(&values).to_string();
    for (field, digit) in YEAR_DIGIT_FIELDS.iter().zip(year.chars()) {
        values.insert(*field, digit.to_string());
    }
    values
}

/// Fill missing or empty well-known fields; present values are never replaced
pub fn backfill_defaults(mut values: FieldValueMap) -> FieldValueMap {
    for (field, default) in DEFAULT_VALUES {
        if values.get(field).map_or(true, str::is_empty) {
            values.insert(field, default);
        }
    }
    values
}

fn primary_seller(values: &FieldValueMap) -> &str {
    PRIMARY_SELLER_FIELDS
        .iter()
        .filter_map(|field| values.get(field))
        .find(|name| !name.is_empty())
        .unwrap_or("")
}

/// Clear every `" 2"` field unless a distinct second seller is named
pub fn suppress_duplicate_rows(values: FieldValueMap) -> FieldValueMap {
    let secondary = values.get(SECONDARY_SELLER_FIELD).unwrap_or("");
    if !secondary.is_empty() && secondary != primary_seller(&values) {
        return values;
    }

    values.map_values(|name, value| {
        if name.ends_with(SECOND_ENTITY_SUFFIX) {
            String::new()
        } else {
            value
        }
    })
}
