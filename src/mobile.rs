//! Mobile number clean-up and country code lookup.
//!
//! All functions are total: malformed input yields `None` or is passed
//! through, never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

struct Country {
    code: &'static str,
    name: &'static str,
    pattern: Regex,
}

/// Registered calling codes, checked in ascending numeric order.
static COUNTRIES: LazyLock<Vec<Country>> = LazyLock::new(|| {
    [
        ("1", "US/Canada", r"^(\+1|1)?[2-9]\d{2}[2-9]\d{2}\d{4}$"),
        ("7", "Russia", r"^(\+7|7)?[3-9]\d{9}$"),
        ("33", "France", r"^(\+33|33)?[1-9]\d{8}$"),
        ("44", "UK", r"^(\+44|44)?[1-9]\d{8,9}$"),
        ("49", "Germany", r"^(\+49|49)?[1-9]\d{10,11}$"),
        ("55", "Brazil", r"^(\+55|55)?[1-9]\d{10}$"),
        ("61", "Australia", r"^(\+61|61)?[2-9]\d{8}$"),
        ("81", "Japan", r"^(\+81|81)?[789]0\d{8}$"),
        ("86", "China", r"^(\+86|86)?1[3-9]\d{9}$"),
        ("91", "India", r"^(\+91|91)?[6-9]\d{8,9}$"),
    ]
    .into_iter()
    .map(|(code, name, pattern)| Country {
        code,
        name,
        pattern: Regex::new(pattern).expect("country pattern is a valid regex"),
    })
    .collect()
});

/// Codes sorted longest first so "91" wins over "1" inside "+91...".
static CODES_LONGEST_FIRST: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut codes: Vec<&'static str> = COUNTRIES.iter().map(|c| c.code).collect();
    codes.sort_by(|a, b| b.len().cmp(&a.len()));
    codes
});

/// Keep digits, plus a `+` when it is the first significant character.
pub fn clean(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

pub fn detect_country_code(raw: &str) -> Option<&'static str> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(country) = COUNTRIES.iter().find(|c| c.pattern.is_match(&cleaned)) {
        return Some(country.code);
    }

    let digits = cleaned.strip_prefix('+')?;
    COUNTRIES
        .iter()
        .find(|c| digits.starts_with(c.code))
        .map(|c| c.code)
}

/// International form of `raw`. Values already carrying a `+` are only cleaned.
pub fn format_with_country_code(raw: &str, default_code: &str) -> String {
    let cleaned = clean(raw);
    if cleaned.is_empty() || cleaned.starts_with('+') {
        return cleaned;
    }
    format!("+{}{}", default_code.trim_start_matches('+'), cleaned)
}

pub fn extract_country_code(raw: &str) -> Option<&'static str> {
    let cleaned = clean(raw);
    let digits = cleaned.strip_prefix('+')?;
    CODES_LONGEST_FIRST
        .iter()
        .copied()
        .find(|code| digits.starts_with(code))
}

pub fn country_name(code: &str) -> &'static str {
    COUNTRIES
        .iter()
        .find(|c| c.code == code)
        .map(|c| c.name)
        .unwrap_or("Unknown")
}

pub fn is_valid_format(raw: &str) -> bool {
    let cleaned = clean(raw);
    !cleaned.is_empty() && COUNTRIES.iter().any(|c| c.pattern.is_match(&cleaned))
}

/// The shape the messaging API expects: country code and digits, no `+`.
pub fn to_gateway_contact(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMobile {
    #[serde(rename = "normalizedMobile")]
    pub mobile: String,
    pub country_code: Option<String>,
    pub country_name: String,
    pub mobile_valid: bool,
}

pub fn normalize(raw: &str, default_code: &str) -> NormalizedMobile {
    let mobile = format_with_country_code(raw, default_code);
    // An unregistered prefix falls back to recognising the raw number itself.
    let country_code = extract_country_code(&mobile).or_else(|| detect_country_code(raw));
    NormalizedMobile {
        country_name: country_code.map(country_name).unwrap_or("Unknown").to_string(),
        country_code: country_code.map(str::to_string),
        mobile_valid: is_valid_format(&mobile),
        mobile,
    }
}
