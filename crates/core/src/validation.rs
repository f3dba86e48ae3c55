//! Field-level checks shared by every input form.

use crate::errors::DomainError;

pub const MAX_QUOTE_TEXT_LEN: usize = 5_000;
pub const MAX_SHORT_FIELD_LEN: usize = 300;
pub const MAX_LONG_FIELD_LEN: usize = 10_000;
pub const MAX_URL_LEN: usize = 2_048;

/// Trims `value` and fails when it is empty or longer than `max_len` chars.
pub fn required(field: &str, value: &str, max_len: usize) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    check_len(field, trimmed, max_len)?;
    Ok(trimmed.to_string())
}

/// Normalizes an optional field: blank becomes `None`.
pub fn optional(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, DomainError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_len(field, v, max_len)?;
            Ok(Some(v.to_string()))
        }
        None => Ok(None),
    }
}

pub fn optional_url(field: &str, value: Option<&str>) -> Result<Option<String>, DomainError> {
    match optional(field, value, MAX_URL_LEN)? {
        Some(url) => {
            url_like(field, &url)?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

pub fn url_like(field: &str, value: &str) -> Result<(), DomainError> {
    let lower = value.to_ascii_lowercase();
    let has_scheme = lower.starts_with("http://") || lower.starts_with("https://");
    let has_host = value.split("://").nth(1).map(|rest| !rest.is_empty()).unwrap_or(false);
    if has_scheme && has_host && !value.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(DomainError::validation(format!("{field} must be an http(s) URL")))
    }
}

fn check_len(field: &str, value: &str, max_len: usize) -> Result<(), DomainError> {
    if value.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

/// Lowercase ASCII slug built from alphanumeric runs joined by `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}
