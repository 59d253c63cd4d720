//! One-shot item commands.

use std::time::Instant;

use anyhow::anyhow;
use tally_core::location;
use tally_core::{Identifier, PendingKey, ViewState};
use tally_events::{Event, EventStream, Notice, Operation, Outcome};
use tracing::warn;

use crate::cli::{AddArgs, DoneArgs, EditArgs, ItemArgs, ListArgs, RemoveArgs, ViewArgs};
use crate::client::{AppContext, CliError, CliResult, parse_id, parse_ids};
use crate::output::{self, Removal, RemovalOutcome};

pub(crate) async fn handle_list(ctx: &AppContext, args: ListArgs) -> CliResult<()> {
    ctx.controller.refresh().await?;

    let store = ctx.session_store();
    let mut view = ctx.view_state(location::restore(args.from.as_deref(), store.as_ref()));
    apply_view_flags(&mut view, &args.view);
    let projection = view.apply(&ctx.controller.items());

    let encoded = match location::persist(view.params(), store.as_ref()) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!(error = %err, "failed to persist view");
            location::encode(view.params())
        }
    };
    let link = args.link.then_some(encoded.as_str());
    output::render_listing(&projection, link, None, ctx.output)
}

pub(crate) async fn handle_add(ctx: &AppContext, args: AddArgs) -> CliResult<()> {
    let item = ctx.controller.create(&args.title).await?;
    output::render_item(&item, ctx.output)
}

pub(crate) async fn handle_toggle(ctx: &AppContext, args: ItemArgs) -> CliResult<()> {
    let id = parse_id(&args.id)?;
    ctx.controller.refresh().await?;
    let item = ctx.controller.toggle(&id).await?;
    output::render_item(&item, ctx.output)
}

pub(crate) async fn handle_edit(ctx: &AppContext, args: EditArgs) -> CliResult<()> {
    let id = parse_id(&args.id)?;
    ctx.controller.refresh().await?;
    let item = ctx.controller.edit_title(&id, &args.title).await?;
    output::render_item(&item, ctx.output)
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: RemoveArgs) -> CliResult<()> {
    let ids = parse_ids(&args.ids)?;
    ctx.controller.refresh().await?;

    let mut events = ctx.controller.events().subscribe(None);
    let key = match ids.as_slice() {
        [id] => ctx.controller.delete(id)?,
        _ => ctx.controller.delete_many(&ids)?,
    };
    let count = armed_count(&mut events, &key);

    if args.now {
        let removal = match ctx.controller.fire(&key).await {
            Some(report) => removal(&key, count, report.failed),
            None => removal_from(&key, count, wait_for_settlement(&mut events, &key).await),
        };
        return output::render_removal(&removal, ctx.output);
    }

    let interrupted = tokio::select! {
        signal = tokio::signal::ctrl_c() => Some(signal),
        notice = wait_for_settlement(&mut events, &key) => {
            let removal = removal_from(&key, count, notice);
            return output::render_removal(&removal, ctx.output);
        }
    };
    if let Some(Err(err)) = interrupted {
        return Err(CliError::failure(anyhow!("failed to listen for Ctrl-C: {err}")));
    }

    let removal = match ctx.controller.undo(&key) {
        Some(_) => Removal {
            key: key.to_string(),
            count,
            outcome: RemovalOutcome::Restored,
            failed: None,
        },
        // The timer won the race; report what it did.
        None => removal_from(&key, count, wait_for_settlement(&mut events, &key).await),
    };
    output::render_removal(&removal, ctx.output)
}

pub(crate) async fn handle_done(ctx: &AppContext, args: DoneArgs) -> CliResult<()> {
    let completed = !args.reopen;
    ctx.controller.refresh().await?;

    let report = if args.all {
        let store = ctx.session_store();
        let mut view = ctx.view_state(location::restore(None, store.as_ref()));
        let visible: Vec<Identifier> = view
            .apply(&ctx.controller.items())
            .items
            .into_iter()
            .filter(|item| item.completed != completed)
            .map(|item| item.id)
            .collect();
        ctx.controller.select_all(&visible)?;
        ctx.controller.complete_selected(completed).await?
    } else {
        let ids = parse_ids(&args.ids)?;
        ctx.controller.set_completed_many(&ids, completed).await?
    };
    output::render_bulk(&report, ctx.output)
}

pub(crate) fn apply_view_flags(view: &mut ViewState, args: &ViewArgs) {
    if let Some(search) = &args.search {
        view.input_search(search.clone(), Instant::now());
        view.flush_search();
    }
    if let Some(status) = args.status {
        view.set_status(status);
    }
    if let Some(sort) = args.sort {
        view.set_sort(sort);
    }
    if let Some(page_size) = args.page_size {
        view.set_page_size(page_size);
    }
    if let Some(page) = args.page {
        view.set_page(page);
    }
}

fn armed_count(events: &mut EventStream, key: &PendingKey) -> usize {
    let label = key.to_string();
    events
        .drain_ready()
        .into_iter()
        .find_map(|envelope| match envelope.event {
            Event::UndoOffered { key, count, .. } if key == label => Some(count),
            _ => None,
        })
        .unwrap_or(0)
}

/// Wait until the delete for `key` fires and return its closing notice.
async fn wait_for_settlement(events: &mut EventStream, key: &PendingKey) -> Option<Notice> {
    let label = key.to_string();
    let mut expired = false;
    while let Some(envelope) = events.next().await {
        match envelope.event {
            Event::UndoExpired { key } if key == label => expired = true,
            Event::Notice(notice)
                if expired
                    && matches!(notice.operation, Operation::Delete | Operation::BulkDelete)
                    && notice.outcome.is_terminal() =>
            {
                return Some(notice);
            }
            _ => {}
        }
    }
    None
}

fn removal(key: &PendingKey, count: usize, failed: usize) -> Removal {
    Removal {
        key: key.to_string(),
        count,
        outcome: if failed == 0 {
            RemovalOutcome::Deleted
        } else {
            RemovalOutcome::Failed
        },
        failed: (failed > 0).then_some(failed),
    }
}

fn removal_from(key: &PendingKey, count: usize, notice: Option<Notice>) -> Removal {
    let failed = notice.is_some_and(|notice| notice.outcome == Outcome::Failed);
    Removal {
        key: key.to_string(),
        count,
        outcome: if failed {
            RemovalOutcome::Failed
        } else {
            RemovalOutcome::Deleted
        },
        failed: None,
    }
}
