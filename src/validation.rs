use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed value of a required field; absent or blank is a validation error.
pub fn required(field: &'static str, label: &str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(field, format!("{label} is required"))),
    }
}

/// Like [`required`], but only when the field was sent.
pub fn non_blank(
    field: &'static str,
    label: &str,
    value: Option<&str>,
) -> Result<Option<String>, AppError> {
    value
        .map(|v| required(field, label, Some(v)))
        .transpose()
}

pub fn email(field: &'static str, value: String) -> Result<String, AppError> {
    let value = value.to_lowercase();
    if !is_valid_email(&value) {
        return Err(AppError::validation(field, "Email is invalid"));
    }
    Ok(value)
}
