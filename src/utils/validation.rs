use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USER_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap();
    static ref CATEGORY_CODE_RE: Regex = Regex::new(r"(?i)^CAT\d+$").unwrap();
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    if !DATE_RE.is_match(value) {
        return Err(AppError::BadRequest(
            "Invalid date format. Use YYYY-MM-DD".to_string(),
        ));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date: {}", value)))
}

/// Parse a `HH:MM:SS` time of day.
pub fn parse_time(value: &str) -> AppResult<NaiveTime> {
    if !TIME_RE.is_match(value) {
        return Err(AppError::BadRequest(
            "Invalid time format. Use HH:MM:SS".to_string(),
        ));
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .map_err(|_| AppError::BadRequest(format!("Invalid time: {}", value)))
}

pub fn validate_email(value: &str) -> AppResult<()> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email address".to_string()))
    }
}

pub fn validate_user_id(value: &str) -> AppResult<()> {
    if USER_ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "User ID must be 3-32 letters, digits or underscores".to_string(),
        ))
    }
}

pub fn is_category_code(value: &str) -> bool {
    CATEGORY_CODE_RE.is_match(value)
}

/// Trimmed, non-empty value of an optional text field.
pub fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Case-insensitive substring match used by the search filters.
pub fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty()
        || haystacks
            .iter()
            .any(|h| h.to_lowercase().contains(&needle))
}
