//! Interactive session over the list.
//!
//! The loop multiplexes three sources: input lines, the search debounce
//! deadline and controller events. Mutations run inline; the stale watcher
//! refreshes in the background after each settle.

use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tally_core::location;
use tally_core::{
    CoreError, Identifier, PageSize, PendingKey, SessionStore, SortMode, StatusFilter, ViewState,
};
use tally_events::Event;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::client::{AppContext, CliError, CliResult};
use crate::output;

const HELP: &str = "\
commands:
  ls                      show the current page
  search <text>           filter by title (applies after a short pause)
  status <all|active|completed>
  sort <activeFirst|completedFirst|az|za>
  size <10|20|50>         rows per page
  page <n> | next | prev  move between pages
  reset                   clear search and status filter
  add <title>             create an item
  toggle <id>             flip completion
  edit <id> <title>       rename
  select <id|all|none>    change the selection (all = current page)
  rm <id|selected>        delete after the undo window
  done [--reopen]         complete (or reopen) the selected items
  undo [key]              undo the latest (or a given) delete
  link                    print the share string for this view
  refresh                 reload from the server
  quit";

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    List,
    Search(String),
    Status(StatusFilter),
    Sort(SortMode),
    Size(PageSize),
    Page(usize),
    Next,
    Prev,
    Reset,
    Add(String),
    Toggle(Identifier),
    Edit(Identifier, String),
    Select(Identifier),
    SelectAll,
    SelectNone,
    Remove(Identifier),
    RemoveSelected,
    Done { reopen: bool },
    Undo(Option<PendingKey>),
    Link,
    Refresh,
    Help,
    Quit,
}

pub(crate) fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let command = match verb {
        "" | "ls" => ShellCommand::List,
        "search" | "/" => ShellCommand::Search(rest.to_string()),
        "status" => ShellCommand::Status(parse_value(rest)?),
        "sort" => ShellCommand::Sort(parse_value(rest)?),
        "size" => ShellCommand::Size(parse_value(rest)?),
        "page" => ShellCommand::Page(
            rest.parse()
                .map_err(|_| format!("'{rest}' is not a page number"))?,
        ),
        "next" => ShellCommand::Next,
        "prev" => ShellCommand::Prev,
        "reset" => ShellCommand::Reset,
        "add" => ShellCommand::Add(require(rest, "add <title>")?.to_string()),
        "toggle" => ShellCommand::Toggle(parse_identifier(rest, "toggle <id>")?),
        "edit" => {
            let (id, title) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: edit <id> <title>".to_string())?;
            ShellCommand::Edit(parse_identifier(id, "edit <id> <title>")?, title.trim().to_string())
        }
        "select" => match rest {
            "all" => ShellCommand::SelectAll,
            "none" => ShellCommand::SelectNone,
            other => ShellCommand::Select(parse_identifier(other, "select <id|all|none>")?),
        },
        "rm" => match rest {
            "selected" => ShellCommand::RemoveSelected,
            other => ShellCommand::Remove(parse_identifier(other, "rm <id|selected>")?),
        },
        "done" => ShellCommand::Done {
            reopen: rest == "--reopen",
        },
        "undo" => ShellCommand::Undo(if rest.is_empty() {
            None
        } else {
            Some(PendingKey::parse(rest).ok_or_else(|| format!("'{rest}' is not a pending key"))?)
        }),
        "link" => ShellCommand::Link,
        "refresh" => ShellCommand::Refresh,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}'; try `help`")),
    };
    Ok(command)
}

fn parse_value<T>(raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err: T::Err| err.to_string())
}

fn require<'a>(raw: &'a str, usage: &str) -> Result<&'a str, String> {
    if raw.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(raw)
    }
}

fn parse_identifier(raw: &str, usage: &str) -> Result<Identifier, String> {
    Identifier::parse(raw).ok_or_else(|| format!("usage: {usage}"))
}

struct Session<'a> {
    ctx: &'a AppContext,
    store: Box<dyn SessionStore>,
    view: ViewState,
    last_delete: Option<PendingKey>,
}

pub(crate) async fn handle_shell(ctx: &AppContext) -> CliResult<()> {
    let store = ctx.session_store();
    let view = ctx.view_state(location::restore(None, store.as_ref()));
    let mut session = Session {
        ctx,
        store,
        view,
        last_delete: None,
    };

    let mut events = ctx.controller.events().subscribe(None);
    if let Err(err) = ctx.controller.refresh().await {
        eprintln!("error: {err}");
    }
    let watcher = ctx.controller.spawn_stale_watcher();
    session.render()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let wake = session.view.search_deadline().map_or_else(
            || tokio::time::Instant::now() + Duration::from_secs(3_600),
            tokio::time::Instant::from_std,
        );
        tokio::select! {
            line = lines.next_line() => {
                let line = line
                    .map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))?;
                let Some(line) = line else { break };
                match parse_line(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => session.run(command).await?,
                    Err(message) => eprintln!("{message}"),
                }
            }
            () = tokio::time::sleep_until(wake), if session.view.search_pending() => {
                if session.view.tick(Instant::now()) {
                    session.render()?;
                }
            }
            Some(envelope) = events.next() => {
                if let Some(line) = output::notice_line(&envelope.event) {
                    eprintln!("{line}");
                }
                if let Event::CollectionRefreshed { count } = envelope.event {
                    eprintln!("(refreshed: {count} items)");
                }
            }
        }
    }

    watcher.abort();
    for report in ctx.controller.flush().await {
        eprintln!(
            "{}: deleted {} on exit ({} failed)",
            report.key, report.attempted, report.failed
        );
    }
    Ok(())
}

impl Session<'_> {
    async fn run(&mut self, command: ShellCommand) -> CliResult<()> {
        let ctx = self.ctx;
        let controller = &ctx.controller;
        match command {
            ShellCommand::List | ShellCommand::Quit => {}
            ShellCommand::Search(text) => {
                self.view.input_search(text, Instant::now());
                return Ok(());
            }
            ShellCommand::Status(status) => {
                self.view.set_status(status);
            }
            ShellCommand::Sort(sort) => {
                self.view.set_sort(sort);
            }
            ShellCommand::Size(size) => {
                self.view.set_page_size(size);
            }
            ShellCommand::Page(page) => self.view.set_page(page),
            ShellCommand::Next => self.view.set_page(self.view.params().page + 1),
            ShellCommand::Prev => self.view.set_page(self.view.params().page.saturating_sub(1)),
            ShellCommand::Reset => self.view.reset_filters(),
            ShellCommand::Add(title) => {
                report(controller.create(&title).await)?;
            }
            ShellCommand::Toggle(id) => {
                report(controller.toggle(&id).await)?;
            }
            ShellCommand::Edit(id, title) => {
                report(controller.edit_title(&id, &title).await)?;
            }
            ShellCommand::Select(id) => {
                report(controller.toggle_selected(&id))?;
            }
            ShellCommand::SelectAll => {
                let visible: Vec<Identifier> = self
                    .view
                    .apply(&controller.items())
                    .items
                    .into_iter()
                    .map(|item| item.id)
                    .collect();
                report(controller.select_all(&visible))?;
            }
            ShellCommand::SelectNone => controller.clear_selection(),
            ShellCommand::Remove(id) => {
                if let Some(key) = report(controller.delete(&id))? {
                    self.last_delete = Some(key);
                }
            }
            ShellCommand::RemoveSelected => {
                if let Some(key) = report(controller.delete_selected())? {
                    self.last_delete = Some(key);
                }
            }
            ShellCommand::Done { reopen } => {
                if let Some(bulk) = report(controller.complete_selected(!reopen).await)? {
                    output::render_bulk(&bulk, ctx.output)?;
                }
            }
            ShellCommand::Undo(key) => {
                let Some(key) = key.or_else(|| self.last_delete.take()) else {
                    eprintln!("nothing to undo");
                    return Ok(());
                };
                if controller.undo(&key).is_none() {
                    eprintln!("{key} can no longer be undone");
                }
            }
            ShellCommand::Link => {
                println!("link: {}", output::share_string(&location::encode(self.view.params())));
                return Ok(());
            }
            ShellCommand::Refresh => {
                report(controller.refresh().await)?;
            }
            ShellCommand::Help => {
                println!("{HELP}");
                return Ok(());
            }
        }
        self.render()
    }

    fn render(&mut self) -> CliResult<()> {
        let projection = self.view.apply(&self.ctx.controller.items());
        if let Err(err) = location::persist(self.view.params(), self.store.as_ref()) {
            warn!(error = %err, "failed to persist view");
        }
        let selection = self.ctx.controller.selection_snapshot();
        output::render_listing(&projection, None, Some(&selection), self.ctx.output)?;
        if selection.count() > 0 {
            println!("{} selected", selection.count());
        }
        Ok(())
    }
}

/// Print rejections and keep the session alive; remote failures were
/// already announced through a notice.
fn report<T>(result: Result<T, CoreError>) -> CliResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CoreError::Remote(_)) => Ok(None),
        Err(err) => {
            eprintln!("error: {err}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_commands() {
        assert_eq!(parse_line(""), Ok(ShellCommand::List));
        assert_eq!(
            parse_line("search  buy milk "),
            Ok(ShellCommand::Search("buy milk".into()))
        );
        assert_eq!(
            parse_line("status completed"),
            Ok(ShellCommand::Status(StatusFilter::Completed))
        );
        assert_eq!(parse_line("sort az"), Ok(ShellCommand::Sort(SortMode::Az)));
        assert_eq!(parse_line("size 50"), Ok(ShellCommand::Size(PageSize::Fifty)));
        assert_eq!(parse_line("page 3"), Ok(ShellCommand::Page(3)));
    }

    #[test]
    fn parses_item_commands() {
        assert_eq!(
            parse_line("edit 4 Walk the dog"),
            Ok(ShellCommand::Edit(Identifier::from(4), "Walk the dog".into()))
        );
        assert_eq!(parse_line("rm selected"), Ok(ShellCommand::RemoveSelected));
        assert_eq!(parse_line("select all"), Ok(ShellCommand::SelectAll));
        assert_eq!(
            parse_line("done --reopen"),
            Ok(ShellCommand::Done { reopen: true })
        );
        assert_eq!(parse_line("undo"), Ok(ShellCommand::Undo(None)));
    }

    #[test]
    fn malformed_lines_explain_usage() {
        assert_eq!(parse_line("add"), Err("usage: add <title>".to_string()));
        assert_eq!(
            parse_line("edit 4"),
            Err("usage: edit <id> <title>".to_string())
        );
        assert!(parse_line("size 15").is_err());
        assert!(parse_line("undo nonsense").is_err());
        assert!(parse_line("frobnicate").is_err());
    }
}
