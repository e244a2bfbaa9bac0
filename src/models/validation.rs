use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::errors::ApiError;

pub const MAX_SETS: i32 = 20;
pub const MAX_REPS: i32 = 100;
pub const MAX_WEIGHT: f64 = 1000.0;
pub const MAX_REST_SECONDS: i32 = 600;

#[derive(Error, Debug, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.0)
    }
}

pub type ValidationResult = Result<(), ValidationError>;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex is valid")
    })
}

/// Emails are compared and stored lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> ValidationResult {
    if email.is_empty() {
        return Err(ValidationError("Email cannot be empty".to_string()));
    }

    if email.len() > 255 {
        return Err(ValidationError(
            "Email cannot be longer than 255 characters".to_string(),
        ));
    }

    if !email_regex().is_match(email) {
        return Err(ValidationError("Invalid email format".to_string()));
    }

    Ok(())
}

/// Non-empty after trimming and at most `max_len` characters
pub fn validate_text(field: &str, value: &str, max_len: usize) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError(format!(
            "{} cannot be longer than {} characters",
            field, max_len
        )));
    }
    Ok(())
}

pub fn validate_optional_text(field: &str, value: Option<&str>, max_len: usize) -> ValidationResult {
    match value {
        Some(text) if text.chars().count() > max_len => Err(ValidationError(format!(
            "{} cannot be longer than {} characters",
            field, max_len
        ))),
        _ => Ok(()),
    }
}

pub fn validate_sets(sets: i32) -> ValidationResult {
    if !(1..=MAX_SETS).contains(&sets) {
        return Err(ValidationError(format!("Sets must be between 1 and {}", MAX_SETS)));
    }
    Ok(())
}

pub fn validate_reps(reps: i32) -> ValidationResult {
    if !(1..=MAX_REPS).contains(&reps) {
        return Err(ValidationError(format!("Reps must be between 1 and {}", MAX_REPS)));
    }
    Ok(())
}

pub fn validate_weight(weight: Option<f64>) -> ValidationResult {
    match weight {
        Some(w) if !w.is_finite() || !(0.0..=MAX_WEIGHT).contains(&w) => Err(ValidationError(
            format!("Weight must be between 0 and {}", MAX_WEIGHT),
        )),
        _ => Ok(()),
    }
}

pub fn validate_rest_seconds(rest_seconds: i32) -> ValidationResult {
    if !(0..=MAX_REST_SECONDS).contains(&rest_seconds) {
        return Err(ValidationError(format!(
            "Rest must be between 0 and {} seconds",
            MAX_REST_SECONDS
        )));
    }
    Ok(())
}
