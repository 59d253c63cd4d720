//! Sample data and controller builders.

use std::time::Duration;

use tally_core::{ControllerSettings, Item, ListController};
use tally_events::EventBus;

use crate::mocks::FakeRemote;

/// The three-item collection used throughout the test suites.
#[must_use]
pub fn sample_items() -> Vec<Item> {
    vec![
        Item::new(1, "Buy milk", false),
        Item::new(2, "Clean", true),
        Item::new(3, "Read", false),
    ]
}

/// `count` incomplete items titled `Task 1..=count`.
#[must_use]
pub fn numbered_items(count: u64) -> Vec<Item> {
    (1..=count)
        .map(|n| Item::new(n, format!("Task {n}"), false))
        .collect()
}

/// Settings used by the suites: a five-second undo window and stock limits.
#[must_use]
pub fn test_settings() -> ControllerSettings {
    ControllerSettings {
        undo_window: Duration::from_secs(5),
        ..ControllerSettings::default()
    }
}

/// Remote and controller both seeded with [`sample_items`].
#[must_use]
pub fn seeded_controller() -> (FakeRemote, ListController<FakeRemote>) {
    let remote = FakeRemote::with_items(sample_items());
    let controller = ListController::with_items(
        remote.clone(),
        EventBus::with_capacity(256),
        test_settings(),
        sample_items(),
    );
    (remote, controller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_items_are_sequential() {
        let items = numbered_items(3);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].title, "Task 3");
        assert_eq!(items[2].key(), "3");
    }

    #[test]
    fn seeded_controller_mirrors_remote() {
        let (remote, controller) = seeded_controller();
        assert_eq!(remote.items(), controller.items());
    }
}
