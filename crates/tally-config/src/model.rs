//! Typed configuration sections.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Remote collection endpoint.
    pub api: ApiConfig,
    /// List behaviour.
    pub list: ListConfig,
    /// Session persistence.
    pub session: SessionConfig,
    /// Logging.
    pub logging: LoggingSection,
}

/// Remote collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Collection resource name under the root.
    pub resource: String,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE_URL.to_string(),
            resource: defaults::API_RESOURCE.to_string(),
            timeout_secs: defaults::API_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Parsed API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the URL does not parse or is
    /// not `http`/`https`.
    pub fn url(&self) -> ConfigResult<Url> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::invalid("api", "base_url", err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "api",
                "base_url",
                "scheme must be http or https",
            ));
        }
        Ok(url)
    }

    /// Transport timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// List behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListConfig {
    /// Undo window for deferred deletes, in milliseconds.
    pub undo_window_ms: u64,
    /// Search debounce, in milliseconds.
    pub search_debounce_ms: u64,
    /// Page size used when neither the location nor the session sets one.
    pub default_page_size: usize,
    /// Largest select-all accepted.
    pub select_all_limit: usize,
    /// Minimum trimmed title length.
    pub min_title_len: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            undo_window_ms: defaults::UNDO_WINDOW_MS,
            search_debounce_ms: defaults::SEARCH_DEBOUNCE_MS,
            default_page_size: defaults::PAGE_SIZE,
            select_all_limit: defaults::SELECT_ALL_LIMIT,
            min_title_len: defaults::MIN_TITLE_LEN,
        }
    }
}

impl ListConfig {
    /// Undo window.
    #[must_use]
    pub const fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    /// Search debounce.
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Session persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// JSON file mirroring the last view; `None` keeps the session in memory.
    pub path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(defaults::SESSION_PATH)),
        }
    }
}

/// Logging section; the format is inferred from the terminal when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Level filter (`error`..`trace` or a full `EnvFilter` directive).
    pub level: String,
    /// `pretty` or `json`.
    pub format: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.list.undo_window(), Duration::from_secs(5));
        assert_eq!(config.list.search_debounce(), Duration::from_millis(200));
        assert_eq!(config.list.select_all_limit, 500);
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.api.url().map(|url| url.to_string()).ok(),
            Some("http://localhost:3000/".to_string())
        );
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let api = ApiConfig {
            base_url: "ftp://example.com".into(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            api.url(),
            Err(ConfigError::InvalidField {
                field: "base_url",
                ..
            })
        ));
    }
}
