//! Notification text for settled operations.

use crate::model::Item;

fn count(n: usize) -> String {
    if n == 1 {
        "1 item".to_string()
    } else {
        format!("{n} items")
    }
}

/// Toggle success.
#[must_use]
pub fn toggled(item: &Item) -> String {
    if item.completed {
        format!("Marked \"{}\" complete", item.title)
    } else {
        format!("Marked \"{}\" active", item.title)
    }
}

/// Title edit success.
#[must_use]
pub fn renamed(item: &Item) -> String {
    format!("Renamed to \"{}\"", item.title)
}

/// Single-item update failure after rollback.
#[must_use]
pub fn update_reverted(title: &str) -> String {
    format!("Could not save \"{title}\"; change reverted")
}

/// Create request sent.
#[must_use]
pub fn creating(title: &str) -> String {
    format!("Adding \"{title}\"")
}

/// Create success.
#[must_use]
pub fn created(item: &Item) -> String {
    format!("Added \"{}\"", item.title)
}

/// Create failure after the placeholder was withdrawn.
#[must_use]
pub fn create_reverted(title: &str) -> String {
    format!("Could not add \"{title}\"; removed")
}

/// Deferred delete settled.
#[must_use]
pub fn deleted(total: usize, failed: usize) -> String {
    if failed == 0 {
        format!("Deleted {}", count(total))
    } else {
        format!("{failed} of {total} deletes failed")
    }
}

/// Undo applied.
#[must_use]
pub fn restored(total: usize) -> String {
    format!("Restored {}", count(total))
}

/// Bulk completion settled.
#[must_use]
pub fn bulk_updated(total: usize, failed: usize) -> String {
    if failed == 0 {
        format!("Updated {}", count(total))
    } else {
        format!("{failed} of {total} updates failed and were reverted")
    }
}

/// Refresh failure.
#[must_use]
pub fn refresh_failed() -> String {
    "Could not load items".to_string()
}
