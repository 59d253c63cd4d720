//! Input validation applied before any cache mutation.

use crate::error::{CoreError, CoreResult};

/// Default minimum title length, counted in characters after trimming.
pub const DEFAULT_MIN_TITLE_LEN: usize = 3;

/// Trim `raw` and check it is long enough to be a title.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when the trimmed title has fewer than
/// `min_len` characters.
pub fn validate_title(raw: &str, min_len: usize) -> CoreResult<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < min_len {
        return Err(CoreError::Validation {
            field: "title",
            reason: format!("must be at least {min_len} characters"),
        });
    }
    Ok(trimmed.to_string())
}
