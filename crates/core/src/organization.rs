//! Organization and account naming rules.
//!
//! Organization names are unique case-insensitively, slugs are URL-safe
//! identifiers derived from the name when the caller does not supply one.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum organization name length, matching the `organizations.name` column.
pub const MAX_ORGANIZATION_NAME_LEN: usize = 255;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex"));

/// Derive a URL slug from a display name.
///
/// ```
/// use cflows_core::organization::slugify;
///
/// assert_eq!(slugify("Acme Motors AB"), "acme-motors-ab");
/// assert_eq!(slugify("  Bilhallen -- Nord! "), "bilhallen-nord");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Validate an organization display name.
pub fn validate_organization_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Organization name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_ORGANIZATION_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Organization name must be at most {MAX_ORGANIZATION_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a URL slug (`acme-motors`).
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid slug '{slug}'. Use lowercase letters, digits and single dashes"
        )))
    }
}

/// Resolve the slug for a new organization: the supplied one, or one derived
/// from the name.
pub fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String, CoreError> {
    let slug = match slug {
        Some(s) => s.trim().to_string(),
        None => slugify(name),
    };
    validate_slug(&slug)?;
    Ok(slug)
}

/// Accounts are looked up by lower-cased email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
