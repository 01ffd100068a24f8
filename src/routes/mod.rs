pub mod health;
pub mod notifications;
pub mod tokens;

use crate::error::{AppError, AppResult};

/// Rejects absent or blank required fields before any state is touched.
pub(crate) fn require(field: Option<String>, name: &str) -> AppResult<String> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::BadRequest(format!(
            "Missing required field: {}",
            name
        ))),
    }
}
