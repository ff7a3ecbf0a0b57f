//! Vehicle record field rules.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Colour stored when none is given.
pub const DEFAULT_COLOR: &str = "Not specified";

/// Maximum registration number length, matching `cars.registration_number`.
pub const MAX_REGISTRATION_LEN: usize = 6;

/// Earliest model year accepted.
pub const MIN_MODEL_YEAR: i32 = 1886;

static REGISTRATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+$").expect("valid regex"));

/// Free-form key/value metadata attached to a car.
pub type CarMetadata = BTreeMap<String, serde_json::Value>;

/// Normalize a registration number: whitespace removed, upper-cased.
///
/// Blank input means "no registration number".
pub fn normalize_registration(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

/// Normalize and validate an optional registration number.
pub fn parse_registration(raw: Option<&str>) -> Result<Option<String>, CoreError> {
    let Some(normalized) = raw.and_then(normalize_registration) else {
        return Ok(None);
    };
    if normalized.chars().count() > MAX_REGISTRATION_LEN {
        return Err(CoreError::Validation(format!(
            "Registration number '{normalized}' is longer than {MAX_REGISTRATION_LEN} characters"
        )));
    }
    if !REGISTRATION_RE.is_match(&normalized) {
        return Err(CoreError::Validation(format!(
            "Registration number '{normalized}' may only contain letters and digits"
        )));
    }
    Ok(Some(normalized))
}

/// Validate a model year against the current year (one year ahead allowed).
pub fn validate_year(year: i32, current_year: i32) -> Result<(), CoreError> {
    if (MIN_MODEL_YEAR..=current_year + 1).contains(&year) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Model year {year} must be between {MIN_MODEL_YEAR} and {}",
            current_year + 1
        )))
    }
}

pub fn validate_mileage(mileage: i32) -> Result<(), CoreError> {
    if mileage < 0 {
        return Err(CoreError::Validation(
            "Mileage must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Trim tags, dropping blanks and repeats while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Car list filter: case-insensitive substring on make and model, exact year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarFilter {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
}

impl CarFilter {
    /// `ILIKE` pattern for the make filter, if set.
    pub fn make_pattern(&self) -> Option<String> {
        self.make.as_deref().and_then(contains_pattern)
    }

    /// `ILIKE` pattern for the model filter, if set.
    pub fn model_pattern(&self) -> Option<String> {
        self.model.as_deref().and_then(contains_pattern)
    }
}

/// Build a `%term%` pattern with LIKE wildcards escaped. Blank terms yield `None`.
pub fn contains_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}
