use carewatch_core::repo::CareRepositories;
use carewatch_core::sync::{
    paths, seed_if_empty, DataEvent, DataItem, InMemoryPairingChannel, PairingChannel, RowBatch,
    SyncManager, SyncMessage, SyncRole,
};
use carewatch_core::{CacheStore, CareTask, Child, Priority, TaskKind, TaskStatus, UpsertMode};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000_000;

fn companion(channel: &Arc<InMemoryPairingChannel>) -> (CacheStore, Arc<SyncManager>) {
    let store = CacheStore::open_in_memory().unwrap();
    let manager = SyncManager::new(store.clone(), channel.clone(), SyncRole::Companion);
    (store, manager)
}

fn host_child(id: &str, name: &str, last_updated: i64) -> Child {
    Child {
        has_pending_tasks: true,
        ..Child::new(id, name, 7, last_updated)
    }
}

fn host_task(id: &str, child_id: &str) -> CareTask {
    CareTask {
        id: id.to_string(),
        child_id: child_id.to_string(),
        title: "Inhaler".to_string(),
        description: "Two puffs".to_string(),
        scheduled_time: NOW + 60_000,
        kind: TaskKind::Medication,
        status: TaskStatus::Pending,
        priority: Priority::High,
        source_id: None,
    }
}

#[test]
fn initialize_on_empty_cache_shows_sample_children() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);

    let outcome = manager.initialize().unwrap();
    assert!(outcome.listening);
    let initial = outcome.initial_data.expect("companion requests initial data");
    assert!(initial.seeded);
    assert!(initial.request_sent);

    let repos = CareRepositories::from_store(&store);
    let sarah = repos.children.get_child("child1").unwrap();
    assert_eq!(sarah.name, "Sarah Johnson");
    assert_eq!(sarah.age, 4);
    assert!(sarah.has_pending_tasks);

    let pending = repos.tasks.list_pending_tasks().unwrap();
    let tylenol = pending
        .iter()
        .find(|task| task.title == "Give Tylenol")
        .expect("Give Tylenol should be pending");
    assert_eq!(tylenol.priority, Priority::Critical);
    assert_eq!(tylenol.priority.as_i64(), 2);

    let request = channel
        .data_items()
        .unwrap()
        .into_iter()
        .find(|item| item.path == paths::REQUEST_INITIAL_DATA)
        .expect("request item on channel");
    assert!(matches!(
        SyncMessage::decode(&request).unwrap(),
        SyncMessage::RequestInitialData { .. }
    ));
}

#[test]
fn request_initial_data_does_not_overwrite_existing_rows() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);
    store
        .upsert_children(&[host_child("kid-1", "Ava Stone", NOW)], UpsertMode::Merge)
        .unwrap();

    let outcome = manager.request_initial_data().unwrap();

    assert!(!outcome.seeded);
    let counts = store.counts().unwrap();
    assert_eq!(counts.children, 1);
    assert_eq!(counts.total(), 1);
}

#[test]
fn seed_runs_once_even_when_requested_repeatedly() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);

    assert!(manager.request_initial_data().unwrap().seeded);
    assert!(!manager.request_initial_data().unwrap().seeded);
    assert!(seed_if_empty(&store, NOW).unwrap().is_none());
    assert_eq!(store.counts().unwrap().total(), 12);
}

#[test]
fn companion_catches_up_with_items_already_on_channel() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let children = SyncMessage::Children(RowBatch::new(vec![host_child("kid-1", "Ava Stone", NOW)]));
    channel.put_data_item(children.encode().unwrap()).unwrap();
    let tasks = SyncMessage::Tasks(RowBatch::new(vec![host_task("t-1", "kid-1")]));
    channel.put_data_item(tasks.encode().unwrap()).unwrap();

    let (store, manager) = companion(&channel);
    let outcome = manager.initialize().unwrap();

    assert_eq!(outcome.caught_up.applied, 2);
    assert!(!outcome.initial_data.unwrap().seeded);
    let child = store.child("kid-1").unwrap().expect("synced child");
    assert!(child.is_synced);
    assert_eq!(store.pending_tasks().unwrap().len(), 1);
}

#[test]
fn host_and_companion_converge_over_one_channel() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let host_store = CacheStore::open_in_memory().unwrap();
    host_store
        .upsert_children(&[host_child("kid-1", "Ava Stone", NOW)], UpsertMode::Merge)
        .unwrap();
    host_store
        .upsert_tasks(&[host_task("t-1", "kid-1")], UpsertMode::Merge)
        .unwrap();
    let host = SyncManager::new(host_store.clone(), channel.clone(), SyncRole::Host);
    assert!(host.initialize().unwrap().listening);

    let (companion_store, companion) = companion(&channel);
    let outcome = companion.initialize().unwrap();
    assert!(outcome.initial_data.unwrap().request_sent);

    let repos = CareRepositories::from_store(&companion_store);
    let ava = repos.children.get_child("kid-1").unwrap();
    assert_eq!(ava.name, "Ava Stone");
    assert!(ava.is_synced);
    assert_eq!(repos.tasks.get_task("t-1").unwrap().title, "Inhaler");
    assert!(host_store.child("child1").unwrap().is_none());
}

#[test]
fn older_child_rows_do_not_overwrite_newer_local_rows() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);
    store
        .upsert_children(&[host_child("kid-1", "Ava Stone", NOW)], UpsertMode::Merge)
        .unwrap();

    let stale = SyncMessage::Children(RowBatch::new(vec![host_child("kid-1", "Old Name", NOW - 1)]));
    let report = manager.on_data_changed(&[DataEvent::changed(stale.encode().unwrap())]);

    assert_eq!(report.applied, 0);
    assert_eq!(report.unchanged, 1);
    assert_eq!(store.child("kid-1").unwrap().unwrap().name, "Ava Stone");
}

#[test]
fn host_rename_applies_after_local_task_completion() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);
    let initial = [
        SyncMessage::Children(RowBatch::new(vec![host_child("kid-1", "Ava", NOW)])),
        SyncMessage::Tasks(RowBatch::new(vec![host_task("t-1", "kid-1")])),
    ];
    let events = initial
        .iter()
        .map(|message| DataEvent::changed(message.encode().unwrap()))
        .collect::<Vec<_>>();
    manager.on_data_changed(&events);

    let repos = CareRepositories::from_store(&store);
    repos.tasks.complete_task("t-1", NOW + 5 * 60_000).unwrap();
    assert_eq!(repos.children.get_child("kid-1").unwrap().last_updated, NOW);

    let rename = SyncMessage::Children(RowBatch::new(vec![host_child("kid-1", "Ava Stone", NOW + 1_000)]));
    let report = manager.on_data_changed(&[DataEvent::changed(rename.encode().unwrap())]);

    assert_eq!(report.applied, 1);
    let ava = repos.children.get_child("kid-1").unwrap();
    assert_eq!(ava.name, "Ava Stone");
    assert!(!ava.has_pending_tasks);
}

#[test]
fn host_task_update_overrides_local_completion_and_restores_pending_flag() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);
    store
        .upsert_children(&[host_child("kid-1", "Ava Stone", NOW)], UpsertMode::Merge)
        .unwrap();
    store
        .upsert_tasks(&[host_task("t-1", "kid-1")], UpsertMode::Merge)
        .unwrap();
    let repos = CareRepositories::from_store(&store);
    repos.tasks.complete_task("t-1", NOW).unwrap();
    assert!(!repos.children.get_child("kid-1").unwrap().has_pending_tasks);

    let moved = CareTask {
        scheduled_time: NOW + 3_600_000,
        ..host_task("t-1", "kid-1")
    };
    let update = SyncMessage::Tasks(RowBatch::new(vec![moved]));
    let report = manager.on_data_changed(&[DataEvent::changed(update.encode().unwrap())]);

    assert_eq!(report.applied, 1);
    let task = repos.tasks.get_task("t-1").unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.scheduled_time, NOW + 3_600_000);
    assert!(repos.children.get_child("kid-1").unwrap().has_pending_tasks);
}

#[test]
fn malformed_items_and_rows_are_skipped_without_failing_batch() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (store, manager) = companion(&channel);

    let mixed = DataItem::new(
        paths::CHILDREN,
        r#"[{"id":"kid-1","name":"Ava Stone","age":5,"lastUpdated":1},{"id":"","name":"x"}]"#,
    );
    let garbage = DataItem::new(paths::MEALS, "not json");
    let unknown = DataItem::new("/weather", "[]");
    let report = manager.on_data_changed(&[
        DataEvent::changed(mixed),
        DataEvent::changed(garbage),
        DataEvent::changed(unknown),
    ]);

    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 3);
    assert!(store.child("kid-1").unwrap().is_some());
}

#[test]
fn unavailable_channel_still_seeds_but_reports_request_not_sent() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    channel.set_available(false);
    let (store, manager) = companion(&channel);

    let outcome = manager.initialize().unwrap();

    assert!(!outcome.listening);
    let initial = outcome.initial_data.unwrap();
    assert!(initial.seeded);
    assert!(!initial.request_sent);
    assert_eq!(store.counts().unwrap().children, 3);
}

#[test]
fn cleanup_removes_listener_and_is_idempotent() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (_store, manager) = companion(&channel);
    manager.initialize().unwrap();
    assert_eq!(channel.listener_count(), 1);

    manager.cleanup();
    manager.cleanup();

    assert!(!manager.is_listening());
    assert_eq!(channel.listener_count(), 0);
}

#[test]
fn dropping_manager_deregisters_listener() {
    let channel = Arc::new(InMemoryPairingChannel::new());
    let (_store, manager) = companion(&channel);
    manager.initialize().unwrap();

    drop(manager);

    assert_eq!(channel.listener_count(), 0);
}
