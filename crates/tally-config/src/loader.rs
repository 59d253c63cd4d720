//! Configuration loading: JSON file, then `TALLY_*` environment overrides,
//! then validation.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate::validate;

/// Load configuration from `path` (defaults when `None`), apply process
/// environment overrides and validate the result.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, an
/// override does not parse, or a value fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<AppConfig> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Read a JSON configuration file; missing fields take their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
pub fn load_file(path: &Path) -> ConfigResult<AppConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), "configuration file loaded");
    Ok(config)
}

/// Apply `TALLY_*` overrides read through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a numeric override does not
/// parse.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let text = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(value) = text("TALLY_API_URL") {
        config.api.base_url = value;
    }
    if let Some(value) = text("TALLY_RESOURCE") {
        config.api.resource = value;
    }
    if let Some(value) = text("TALLY_TIMEOUT_SECS") {
        config.api.timeout_secs = parse("api", "timeout_secs", &value)?;
    }
    if let Some(value) = text("TALLY_UNDO_WINDOW_MS") {
        config.list.undo_window_ms = parse("list", "undo_window_ms", &value)?;
    }
    if let Some(value) = text("TALLY_SEARCH_DEBOUNCE_MS") {
        config.list.search_debounce_ms = parse("list", "search_debounce_ms", &value)?;
    }
    if let Some(value) = text("TALLY_PAGE_SIZE") {
        config.list.default_page_size = parse("list", "default_page_size", &value)?;
    }
    if let Some(value) = text("TALLY_SELECT_ALL_LIMIT") {
        config.list.select_all_limit = parse("list", "select_all_limit", &value)?;
    }
    if let Some(value) = text("TALLY_MIN_TITLE_LEN") {
        config.list.min_title_len = parse("list", "min_title_len", &value)?;
    }
    if let Some(value) = text("TALLY_SESSION_PATH") {
        config.session.path = match value.as_str() {
            "none" | "memory" => None,
            _ => Some(PathBuf::from(value)),
        };
    }
    if let Some(value) = text("TALLY_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Some(value) = text("TALLY_LOG_FORMAT") {
        config.logging.format = Some(value);
    }
    Ok(())
}

fn parse<T: FromStr>(section: &'static str, field: &'static str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(section, field, format!("'{value}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_fields_override_defaults_and_missing_ones_fill_in() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tally.json");
        std::fs::write(
            &path,
            r#"{"api":{"base_url":"https://todo.example"},"list":{"undo_window_ms":3000}}"#,
        )?;

        let config = load_file(&path)?;
        assert_eq!(config.api.base_url, "https://todo.example");
        assert_eq!(config.api.resource, "todos");
        assert_eq!(config.list.undo_window_ms, 3_000);
        assert_eq!(config.list.search_debounce_ms, 200);
        Ok(())
    }

    #[test]
    fn unknown_fields_and_bad_json_are_parse_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tally.json");
        std::fs::write(&path, r#"{"list":{"undo_window":3000}}"#)?;
        assert!(matches!(load_file(&path), Err(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_file(&missing), Err(ConfigError::Io { .. })));
        Ok(())
    }

    #[test]
    fn env_overrides_apply_on_top_of_file_values() -> Result<()> {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("TALLY_API_URL", " http://10.0.0.2:8080 "),
                ("TALLY_UNDO_WINDOW_MS", "1500"),
                ("TALLY_SESSION_PATH", "memory"),
                ("TALLY_LOG_FORMAT", "json"),
                ("TALLY_RESOURCE", ""),
            ]),
        )?;
        assert_eq!(config.api.base_url, "http://10.0.0.2:8080");
        assert_eq!(config.api.resource, "todos");
        assert_eq!(config.list.undo_window_ms, 1_500);
        assert_eq!(config.session.path, None);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn malformed_numeric_override_names_the_field() {
        let mut config = AppConfig::default();
        let result = apply_env_overrides(&mut config, lookup(&[("TALLY_PAGE_SIZE", "ten")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                section: "list",
                field: "default_page_size",
                ..
            })
        ));
    }
}
