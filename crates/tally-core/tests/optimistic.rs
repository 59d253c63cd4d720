use tally_core::{CoreError, Identifier, Item, ListController};
use tally_events::{EventBus, Operation, Outcome};
use tally_test_support::assert::{notices, sole_outcome, terminal_notices};
use tally_test_support::fixtures::{numbered_items, sample_items, seeded_controller, test_settings};
use tally_test_support::mocks::FakeRemote;

#[tokio::test]
async fn failed_toggle_restores_collection_and_reports_revert() {
    let (remote, controller) = seeded_controller();
    remote.fail_update_for(1);

    let result = controller.toggle(&Identifier::from(1)).await;

    assert!(matches!(result, Err(CoreError::Remote(_))));
    assert_eq!(controller.items(), sample_items());
    assert_eq!(sole_outcome(controller.events(), Operation::Toggle), Outcome::Reverted);
    assert!(controller.cache().is_stale());
}

#[tokio::test]
async fn overlapping_updates_roll_back_independently() {
    let (remote, controller) = seeded_controller();
    remote.fail_update_for(1);
    let gate = remote.hold_updates();

    let first = Identifier::from(1);
    let third = Identifier::from(3);
    let release = async {
        tokio::task::yield_now().await;
        let optimistic = controller.items();
        assert!(optimistic[0].completed);
        assert!(optimistic[2].completed);
        gate.notify_waiters();
    };
    let (toggle_first, toggle_third, ()) =
        tokio::join!(controller.toggle(&first), controller.toggle(&third), release);

    assert!(toggle_first.is_err());
    assert!(toggle_third.is_ok_and(|item| item.completed));
    let items = controller.items();
    assert!(!items[0].completed);
    assert!(items[2].completed);
    assert_eq!(remote.update_count(), 2);

    let outcomes: Vec<Outcome> = terminal_notices(controller.events(), Operation::Toggle)
        .into_iter()
        .map(|notice| notice.outcome)
        .collect();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.contains(&Outcome::Reverted));
    assert!(outcomes.contains(&Outcome::Succeeded));
}

#[tokio::test]
async fn edit_title_adopts_server_version() {
    let (remote, controller) = seeded_controller();

    let edited = controller
        .edit_title(&Identifier::from(3), "  Read a book ")
        .await;

    assert_eq!(edited.ok().map(|item| item.title), Some("Read a book".to_string()));
    assert_eq!(controller.items()[2].title, "Read a book");
    assert_eq!(remote.items()[2].title, "Read a book");
    assert_eq!(sole_outcome(controller.events(), Operation::Edit), Outcome::Succeeded);
}

#[tokio::test]
async fn short_titles_never_reach_the_remote() {
    let (remote, controller) = seeded_controller();

    let result = controller.edit_title(&Identifier::from(3), " ab ").await;

    assert!(matches!(result, Err(CoreError::Validation { field: "title", .. })));
    assert_eq!(remote.update_count(), 0);
    assert!(notices(controller.events()).is_empty());
}

#[tokio::test]
async fn create_replaces_placeholder_with_server_item() {
    let (remote, controller) = seeded_controller();
    let gate = remote.hold_creates();

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.create("Walk dog").await })
    };
    tokio::task::yield_now().await;

    let placeholder = controller.items()[0].clone();
    assert!(!placeholder.id.is_persisted());
    assert_eq!(placeholder.title, "Walk dog");

    gate.notify_one();
    let created = pending.await.ok().and_then(Result::ok);
    assert_eq!(created.as_ref().map(Item::key), Some("4".to_string()));

    let keys: Vec<String> = controller.items().iter().map(Item::key).collect();
    assert_eq!(keys, vec!["4", "1", "2", "3"]);
    assert_eq!(sole_outcome(controller.events(), Operation::Create), Outcome::Succeeded);
}

#[tokio::test]
async fn create_racing_refresh_inserts_once() {
    let (remote, controller) = seeded_controller();
    let gate = remote.hold_creates();

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.create("Walk dog").await })
    };
    tokio::task::yield_now().await;

    assert_eq!(controller.refresh().await.ok(), Some(5));
    gate.notify_one();
    assert!(pending.await.is_ok_and(|result| result.is_ok()));

    let titles: Vec<String> = controller
        .items()
        .into_iter()
        .map(|item| item.title)
        .filter(|title| title == "Walk dog")
        .collect();
    assert_eq!(titles.len(), 1);
    assert!(controller.items().iter().all(|item| item.id.is_persisted()));
}

#[tokio::test]
async fn failed_create_withdraws_placeholder() {
    let (remote, controller) = seeded_controller();
    remote.fail_create(true);

    let result = controller.create("Walk dog").await;

    assert!(result.is_err());
    assert_eq!(controller.items(), sample_items());
    assert_eq!(sole_outcome(controller.events(), Operation::Create), Outcome::Reverted);
}

#[tokio::test]
async fn bulk_completion_rolls_back_failures_only() {
    let (remote, controller) = seeded_controller();
    remote.fail_update_for(3);

    let report = controller
        .set_completed_many(&[Identifier::from(1), Identifier::from(3)], true)
        .await;

    let report = report.ok();
    assert_eq!(report.map(|report| (report.updated, report.failed)), Some((1, 1)));
    let items = controller.items();
    assert!(items[0].completed);
    assert!(!items[2].completed);
    assert_eq!(
        sole_outcome(controller.events(), Operation::BulkUpdate),
        Outcome::Reverted
    );
}

#[tokio::test]
async fn select_all_above_limit_is_refused() {
    let items = numbered_items(501);
    let ids: Vec<Identifier> = items.iter().map(|item| item.id.clone()).collect();
    let controller = ListController::with_items(
        FakeRemote::with_items(items.clone()),
        EventBus::new(),
        test_settings(),
        items,
    );

    let result = controller.select_all(&ids);

    assert!(matches!(result, Err(CoreError::Selection(_))));
    assert_eq!(controller.selection_snapshot().count(), 0);
    assert_eq!(controller.select_all(&ids[..500]).ok(), Some(500));
}

#[tokio::test]
async fn refresh_failure_leaves_cache_untouched() {
    let (remote, controller) = seeded_controller();
    remote.fail_list(true);
    controller.cache().mark_stale();

    assert!(controller.refresh().await.is_err());
    assert_eq!(controller.items(), sample_items());
    assert!(controller.cache().is_stale());
    assert_eq!(
        sole_outcome(controller.events(), Operation::Refresh),
        Outcome::Failed
    );
}

#[tokio::test]
async fn stale_watcher_refreshes_after_mutation() {
    let (remote, controller) = seeded_controller();
    let watcher = controller.spawn_stale_watcher();
    remote.insert(Item::new(9, "Server side", false));

    let _ = controller.toggle(&Identifier::from(1)).await;
    for _ in 0..50 {
        if !controller.cache().is_stale() {
            break;
        }
        tokio::task::yield_now().await;
    }
    watcher.abort();

    assert!(!controller.cache().is_stale());
    assert!(
        controller
            .items()
            .iter()
            .any(|item| item.id == Identifier::from(9))
    );
}
