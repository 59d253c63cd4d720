//! Output renderers and formatting helpers for CLI commands.

use std::time::Duration;

use anyhow::anyhow;
use serde::Serialize;
use tally_core::{BulkReport, EmptyState, Item, Projection, SelectionSet};
use tally_events::{Event, EventEnvelope, Outcome};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// What happened to a deferred delete once the command stopped waiting.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Removal {
    pub(crate) key: String,
    pub(crate) count: usize,
    pub(crate) outcome: RemovalOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) failed: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RemovalOutcome {
    Deleted,
    Restored,
    Failed,
}

#[derive(Serialize)]
struct Listing<'a> {
    #[serde(flatten)]
    projection: &'a Projection,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<Vec<String>>,
}

pub(crate) fn render_listing(
    projection: &Projection,
    link: Option<&str>,
    selection: Option<&SelectionSet>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&Listing {
            projection,
            link,
            selected: selection.map(SelectionSet::keys),
        }),
        OutputFormat::Table => {
            print!("{}", format_table(projection, selection));
            if let Some(link) = link {
                println!("link: {}", share_string(link));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_item(item: &Item, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(item),
        OutputFormat::Table => {
            println!("{} {} {}", item.id, checkbox(item.completed), item.title);
            Ok(())
        }
    }
}

pub(crate) fn render_removal(removal: &Removal, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(removal),
        OutputFormat::Table => {
            match removal.outcome {
                RemovalOutcome::Deleted => println!("deleted {} item(s)", removal.count),
                RemovalOutcome::Restored => println!("restored {} item(s)", removal.count),
                RemovalOutcome::Failed => println!(
                    "deleted {} item(s); {} could not be deleted on the server",
                    removal.count,
                    removal.failed.unwrap_or(0)
                ),
            }
            Ok(())
        }
    }
}

pub(crate) fn render_bulk(report: &BulkReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "updated": report.updated,
            "failed": report.failed,
        })),
        OutputFormat::Table => {
            println!("updated: {}", report.updated);
            if report.failed > 0 {
                println!("failed: {}", report.failed);
            }
            Ok(())
        }
    }
}

/// Notices go to stderr so stdout stays parseable.
pub(crate) fn render_notices(events: &[EventEnvelope]) {
    for envelope in events {
        if let Some(line) = notice_line(&envelope.event) {
            eprintln!("{line}");
        }
    }
}

pub(crate) fn notice_line(event: &Event) -> Option<String> {
    match event {
        Event::Notice(notice) => {
            let marker = match notice.outcome {
                Outcome::InFlight => "..",
                Outcome::Succeeded => "ok",
                Outcome::Failed => "!!",
                Outcome::Reverted => "<-",
            };
            Some(format!("[{marker}] {}", notice.message))
        }
        Event::UndoOffered {
            key,
            count,
            window_ms,
        } => Some(format!(
            "[..] {count} item(s) will be deleted in {:.1}s (undo {key})",
            Duration::from_millis(*window_ms).as_secs_f64()
        )),
        Event::UndoExpired { .. }
        | Event::CollectionStale { .. }
        | Event::CollectionRefreshed { .. } => None,
    }
}

pub(crate) fn format_table(projection: &Projection, selection: Option<&SelectionSet>) -> String {
    let mut out = String::new();
    match projection.empty {
        Some(EmptyState::NoItems) => {
            out.push_str("no items yet; add one with `add <title>`\n");
            return out;
        }
        Some(EmptyState::NoMatches) => {
            out.push_str("no items match the current filters\n");
            return out;
        }
        None => {}
    }

    let width = projection
        .items
        .iter()
        .map(|item| item.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    out.push_str(&format!("  {:<width$} {:<4} TITLE\n", "ID", "DONE"));
    for item in &projection.items {
        let marker = if selection.is_some_and(|set| set.contains(&item.id)) {
            '*'
        } else {
            ' '
        };
        out.push_str(&format!(
            "{marker} {:<width$} {:<4} {}\n",
            item.id.to_string(),
            checkbox(item.completed),
            item.title
        ));
    }
    out.push_str(&format!(
        "page {}/{} ({} matching)\n",
        projection.page, projection.total_pages, projection.total_matching
    ));
    out
}

pub(crate) fn share_string(encoded: &str) -> String {
    format!("?{encoded}")
}

const fn checkbox(completed: bool) -> &'static str {
    if completed { "[x]" } else { "[ ]" }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}
