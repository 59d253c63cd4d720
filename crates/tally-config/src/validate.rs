//! Range and format checks applied after loading.

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Check every field of `config`.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] found.
pub fn validate(config: &AppConfig) -> ConfigResult<()> {
    config.api.url()?;
    if config.api.resource.trim().trim_matches('/').is_empty() {
        return Err(ConfigError::invalid("api", "resource", "must not be empty"));
    }
    if config.api.timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "api",
            "timeout_secs",
            "must be greater than zero",
        ));
    }

    let list = &config.list;
    if list.undo_window_ms == 0 || list.undo_window_ms > defaults::MAX_UNDO_WINDOW_MS {
        return Err(ConfigError::invalid(
            "list",
            "undo_window_ms",
            format!("must be between 1 and {}", defaults::MAX_UNDO_WINDOW_MS),
        ));
    }
    if list.search_debounce_ms > defaults::MAX_SEARCH_DEBOUNCE_MS {
        return Err(ConfigError::invalid(
            "list",
            "search_debounce_ms",
            format!("must be at most {}", defaults::MAX_SEARCH_DEBOUNCE_MS),
        ));
    }
    if !defaults::PAGE_SIZES.contains(&list.default_page_size) {
        return Err(ConfigError::invalid(
            "list",
            "default_page_size",
            "must be one of 10, 20 or 50",
        ));
    }
    if list.select_all_limit == 0 {
        return Err(ConfigError::invalid(
            "list",
            "select_all_limit",
            "must be greater than zero",
        ));
    }
    if list.min_title_len == 0 {
        return Err(ConfigError::invalid(
            "list",
            "min_title_len",
            "must be greater than zero",
        ));
    }

    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid("logging", "level", "must not be empty"));
    }
    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "pretty" | "json")
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            "must be 'pretty' or 'json'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(config: &AppConfig) -> Option<&'static str> {
        match validate(config) {
            Err(ConfigError::InvalidField { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_values_name_their_field() {
        let mut config = AppConfig::default();
        config.list.default_page_size = 15;
        assert_eq!(field_of(&config), Some("default_page_size"));

        let mut config = AppConfig::default();
        config.list.undo_window_ms = 0;
        assert_eq!(field_of(&config), Some("undo_window_ms"));

        let mut config = AppConfig::default();
        config.api.resource = "/".into();
        assert_eq!(field_of(&config), Some("resource"));

        let mut config = AppConfig::default();
        config.logging.format = Some("xml".into());
        assert_eq!(field_of(&config), Some("format"));
    }
}
