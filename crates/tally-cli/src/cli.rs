//! Argument parsing, configuration layering and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tally_config::AppConfig;
use tally_core::{PageSize, SortMode, StatusFilter};
use tally_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};
use url::Url;

use crate::client::{AppContext, CliResult};
use crate::commands::{items, shell};
use crate::output;

/// Parses CLI arguments, executes the requested command and reports errors.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli)?;

    let logging = LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_setting(config.logging.format.as_deref()),
        build_sha: option_env!("TALLY_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }
    let _context = GlobalContextGuard::new(command_label(&cli.command));

    let ctx = AppContext::connect(config, cli.output)?;
    let since = ctx.controller.events().last_event_id().unwrap_or(0);
    let result = dispatch(cli.command, &ctx).await;
    output::render_notices(&ctx.controller.events().recent(since));
    result
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Ls(args) => items::handle_list(ctx, args).await,
        Command::Add(args) => items::handle_add(ctx, args).await,
        Command::Toggle(args) => items::handle_toggle(ctx, args).await,
        Command::Edit(args) => items::handle_edit(ctx, args).await,
        Command::Rm(args) => items::handle_remove(ctx, args).await,
        Command::Done(args) => items::handle_done(ctx, args).await,
        Command::Shell => shell::handle_shell(ctx).await,
    }
}

fn load_config(cli: &Cli) -> CliResult<AppConfig> {
    let mut config = tally_config::load(cli.config.as_deref())?;
    apply_flags(&mut config, cli);
    tally_config::validate(&config)?;
    Ok(config)
}

fn apply_flags(config: &mut AppConfig, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.to_string();
    }
    if let Some(resource) = &cli.resource {
        config.api.resource.clone_from(resource);
    }
    if let Some(timeout) = cli.timeout {
        config.api.timeout_secs = timeout;
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Ls(_) => "ls",
        Command::Add(_) => "add",
        Command::Toggle(_) => "toggle",
        Command::Edit(_) => "edit",
        Command::Rm(_) => "rm",
        Command::Done(_) => "done",
        Command::Shell => "shell",
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

#[derive(Parser)]
#[command(name = "tally", about = "Task list client with optimistic edits and undoable deletes")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "TALLY_API_URL", value_parser = parse_url)]
    api_url: Option<Url>,
    #[arg(long, global = true, env = "TALLY_RESOURCE")]
    resource: Option<String>,
    #[arg(long, global = true, env = "TALLY_TIMEOUT_SECS")]
    timeout: Option<u64>,
    #[arg(long, global = true, env = "TALLY_CONFIG", help = "JSON configuration file")]
    config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List items through the current view.
    Ls(ListArgs),
    /// Create an item.
    Add(AddArgs),
    /// Flip an item between active and completed.
    Toggle(ItemArgs),
    /// Rename an item.
    Edit(EditArgs),
    /// Delete items after an undo window.
    Rm(RemoveArgs),
    /// Mark several items completed (or active again).
    Done(DoneArgs),
    /// Interactive session over the list.
    Shell,
}

#[derive(Args, Default)]
pub(crate) struct ViewArgs {
    #[arg(short = 'q', long)]
    pub(crate) search: Option<String>,
    #[arg(long, help = "all, active or completed")]
    pub(crate) status: Option<StatusFilter>,
    #[arg(long, help = "activeFirst, completedFirst, az or za")]
    pub(crate) sort: Option<SortMode>,
    #[arg(long)]
    pub(crate) page: Option<usize>,
    #[arg(long, help = "10, 20 or 50")]
    pub(crate) page_size: Option<PageSize>,
}

#[derive(Args, Default)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub(crate) view: ViewArgs,
    #[arg(long, help = "Print the share string for the resulting view")]
    pub(crate) link: bool,
    #[arg(long, help = "Restore the view from a share string")]
    pub(crate) from: Option<String>,
}

#[derive(Args)]
pub(crate) struct AddArgs {
    #[arg(help = "Item title")]
    pub(crate) title: String,
}

#[derive(Args)]
pub(crate) struct ItemArgs {
    #[arg(help = "Item identifier")]
    pub(crate) id: String,
}

#[derive(Args)]
pub(crate) struct EditArgs {
    #[arg(help = "Item identifier")]
    pub(crate) id: String,
    #[arg(help = "New title")]
    pub(crate) title: String,
}

#[derive(Args)]
pub(crate) struct RemoveArgs {
    #[arg(required = true, help = "Item identifiers")]
    pub(crate) ids: Vec<String>,
    #[arg(long, help = "Skip the undo window")]
    pub(crate) now: bool,
}

#[derive(Args)]
pub(crate) struct DoneArgs {
    #[arg(help = "Item identifiers")]
    pub(crate) ids: Vec<String>,
    #[arg(long, conflicts_with = "ids", help = "Select every item on the current page")]
    pub(crate) all: bool,
    #[arg(long, help = "Mark items active instead")]
    pub(crate) reopen: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_url_rejects_invalid_input() {
        let err = parse_url("not-a-url").expect_err("invalid URL should fail");
        assert!(err.contains("invalid URL"));
    }

    #[test]
    fn view_flags_parse_into_typed_values() {
        let cli = Cli::try_parse_from([
            "tally", "ls", "--status", "completed", "--sort", "za", "--page-size", "20", "--link",
        ])
        .expect("valid arguments");
        let Command::Ls(args) = cli.command else {
            panic!("expected ls");
        };
        assert_eq!(args.view.status, Some(StatusFilter::Completed));
        assert_eq!(args.view.sort, Some(SortMode::Za));
        assert_eq!(args.view.page_size, Some(PageSize::Twenty));
        assert!(args.link);
    }

    #[test]
    fn unknown_view_values_are_usage_errors() {
        assert!(Cli::try_parse_from(["tally", "ls", "--page-size", "15"]).is_err());
        assert!(Cli::try_parse_from(["tally", "ls", "--status", "done"]).is_err());
    }

    #[test]
    fn flags_override_loaded_configuration() {
        let cli = Cli::try_parse_from([
            "tally",
            "--api-url",
            "http://10.1.1.1:9000",
            "--resource",
            "tasks",
            "--timeout",
            "3",
            "shell",
        ])
        .expect("valid arguments");
        let mut config = AppConfig::default();
        apply_flags(&mut config, &cli);
        assert_eq!(config.api.base_url, "http://10.1.1.1:9000/");
        assert_eq!(config.api.resource, "tasks");
        assert_eq!(config.api.timeout_secs, 3);
        assert_eq!(command_label(&cli.command), "shell");
    }
}
