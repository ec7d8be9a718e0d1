//! Input validation shared by the handlers.

use super::response::ApiError;

pub const MAX_ID_LEN: usize = 100;
pub const MIN_READING_VALUE: f64 = -1000.0;
pub const MAX_READING_VALUE: f64 = 10000.0;
pub const MAX_LIST_LIMIT: usize = 1000;

// ---

/// Ids are 1 to 100 characters of `[A-Za-z0-9_-]`.
pub fn validate_id(field: &'static str, id: &str) -> Result<(), ApiError> {
    // ---
    if id.is_empty() {
        return Err(ApiError::bad_request(
            "MISSING_PARAMETER",
            format!("{field} is required"),
        ));
    }
    if id.len() > MAX_ID_LEN {
        return Err(ApiError::invalid_parameter(
            field,
            format!("must be at most {MAX_ID_LEN} characters"),
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::invalid_parameter(
            field,
            "only letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(())
}

pub fn validate_value(value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() || !(MIN_READING_VALUE..=MAX_READING_VALUE).contains(&value) {
        return Err(ApiError::invalid_parameter(
            "value",
            format!("must be between {MIN_READING_VALUE} and {MAX_READING_VALUE}"),
        ));
    }
    Ok(value)
}

pub fn validate_battery(level: f64) -> Result<f64, ApiError> {
    if !level.is_finite() || !(0.0..=100.0).contains(&level) {
        return Err(ApiError::invalid_parameter(
            "batteryLevel",
            "must be between 0 and 100",
        ));
    }
    Ok(level)
}

/// `limit` query parameter: absent means the caller's default.
pub fn parse_limit(raw: Option<&str>) -> Result<Option<usize>, ApiError> {
    // ---
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_LIST_LIMIT).contains(&n) => Ok(Some(n)),
        _ => Err(ApiError::invalid_parameter(
            "limit",
            format!("must be an integer between 1 and {MAX_LIST_LIMIT}"),
        )),
    }
}

/// Required string fields that are absent or blank.
pub fn missing<'a>(fields: &[(&'a str, Option<&String>)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect()
}
