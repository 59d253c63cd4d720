//! Shared context and error types for command handlers.

use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use tally_client::HttpCollection;
use tally_config::{AppConfig, ConfigError};
use tally_core::{
    ControllerSettings, CoreError, FileSessionStore, Identifier, ListController,
    MemorySessionStore, PageSize, SessionStore, ViewParams, ViewState,
};
use tally_events::EventBus;

use crate::cli::OutputFormat;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_rejection() {
            Self::validation(err.to_string())
        } else {
            Self::failure(err)
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidField { .. } => Self::validation(err.to_string()),
            other => Self::failure(other),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) controller: ListController<HttpCollection>,
    pub(crate) config: AppConfig,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the HTTP remote and the controller from validated configuration.
    pub(crate) fn connect(config: AppConfig, output: OutputFormat) -> CliResult<Self> {
        let url = config.api.url()?;
        let remote = HttpCollection::new(&url, &config.api.resource, config.api.timeout())
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        let controller = ListController::new(remote, EventBus::new(), settings_from(&config));
        Ok(Self {
            controller,
            config,
            output,
        })
    }

    /// Session store named by the configuration.
    pub(crate) fn session_store(&self) -> Box<dyn SessionStore> {
        match &self.config.session.path {
            Some(path) => Box::new(FileSessionStore::new(path.clone())),
            None => Box::new(MemorySessionStore::new()),
        }
    }

    /// View state over `params`, using the configured page size when the
    /// restored view left it at its default.
    pub(crate) fn view_state(&self, mut params: ViewParams) -> ViewState {
        if params.page_size == PageSize::default()
            && let Ok(size) = PageSize::try_from(self.config.list.default_page_size)
        {
            params.page_size = size;
        }
        ViewState::new(params, self.config.list.search_debounce())
    }
}

pub(crate) fn settings_from(config: &AppConfig) -> ControllerSettings {
    ControllerSettings {
        undo_window: config.list.undo_window(),
        select_all_limit: config.list.select_all_limit,
        min_title_len: config.list.min_title_len,
    }
}

pub(crate) fn parse_id(raw: &str) -> CliResult<Identifier> {
    Identifier::parse(raw).ok_or_else(|| CliError::validation("item id must not be empty"))
}

pub(crate) fn parse_ids(raw: &[String]) -> CliResult<Vec<Identifier>> {
    raw.iter().map(|id| parse_id(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tally_core::SortMode;

    #[test]
    fn exit_codes_separate_validation_from_failure() {
        let validation = CliError::from(CoreError::NotFound {
            id: Identifier::from(7),
        });
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(validation.display_message(), "item 7 not found");

        let failure = CliError::failure(anyhow!("boom"));
        assert_eq!(failure.exit_code(), 3);
    }

    #[test]
    fn settings_follow_the_list_section() {
        let mut config = AppConfig::default();
        config.list.undo_window_ms = 1_500;
        config.list.min_title_len = 5;
        let settings = settings_from(&config);
        assert_eq!(settings.undo_window, Duration::from_millis(1_500));
        assert_eq!(settings.min_title_len, 5);
        assert_eq!(settings.select_all_limit, 500);
    }

    #[test]
    fn configured_page_size_applies_only_to_default_views() -> anyhow::Result<()> {
        let mut config = AppConfig::default();
        config.list.default_page_size = 20;
        config.session.path = None;
        let ctx = AppContext::connect(config, OutputFormat::Table)
            .map_err(|err| anyhow!(err.display_message()))?;

        let view = ctx.view_state(ViewParams::default());
        assert_eq!(view.params().page_size, PageSize::Twenty);

        let restored = ViewParams {
            page_size: PageSize::Fifty,
            sort: SortMode::Az,
            ..ViewParams::default()
        };
        let view = ctx.view_state(restored);
        assert_eq!(view.params().page_size, PageSize::Fifty);
        Ok(())
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(matches!(parse_id("  "), Err(CliError::Validation(_))));
        assert!(matches!(parse_ids(&["3".into(), "abc".into()]), Ok(ids) if ids.len() == 2));
    }
}
