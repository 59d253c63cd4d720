//! Assertions over what a controller published on its bus.

use tally_events::{Event, EventBus, Notice, Operation, Outcome};

/// Every notice published so far, oldest first.
#[must_use]
pub fn notices(bus: &EventBus) -> Vec<Notice> {
    bus.recent(0)
        .into_iter()
        .filter_map(|envelope| match envelope.event {
            Event::Notice(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

/// Terminal notices published for `operation`.
#[must_use]
pub fn terminal_notices(bus: &EventBus, operation: Operation) -> Vec<Notice> {
    notices(bus)
        .into_iter()
        .filter(|notice| notice.operation == operation && notice.outcome.is_terminal())
        .collect()
}

/// Outcome of the single terminal notice for `operation`.
///
/// # Panics
///
/// Panics when there is not exactly one terminal notice for `operation`.
#[must_use]
pub fn sole_outcome(bus: &EventBus, operation: Operation) -> Outcome {
    let terminal = terminal_notices(bus, operation);
    assert_eq!(
        terminal.len(),
        1,
        "expected one terminal {} notice, got {terminal:?}",
        operation.as_str()
    );
    terminal[0].outcome
}

/// Discriminators of every event published so far.
#[must_use]
pub fn event_kinds(bus: &EventBus) -> Vec<&'static str> {
    bus.recent(0)
        .iter()
        .map(|envelope| envelope.event.kind())
        .collect()
}
