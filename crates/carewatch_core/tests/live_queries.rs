use carewatch_core::repo::CareRepositories;
use carewatch_core::sync::{apply_message, seed_if_empty, RowBatch, SyncMessage};
use carewatch_core::{CacheStore, Child, TaskStatus};
use std::time::Duration;
use tokio::time::timeout;

const NOW: i64 = 1_700_000_000_000;
const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn observe_children_emits_current_snapshot_then_synced_rows() {
    let store = CacheStore::open_in_memory().unwrap();
    let repos = CareRepositories::from_store(&store);
    let mut children = repos.children.observe_children();

    let first = timeout(WAIT, children.next()).await.unwrap().unwrap().unwrap();
    assert!(first.is_empty());

    let message = SyncMessage::Children(RowBatch::new(vec![Child::new("kid-1", "Ava Stone", 5, NOW)]));
    apply_message(&store, message).unwrap();

    let second = timeout(WAIT, children.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].name, "Ava Stone");
}

#[tokio::test]
async fn seeded_rows_appear_in_every_live_query() {
    let store = CacheStore::open_in_memory().unwrap();
    let repos = CareRepositories::from_store(&store);
    let mut pending = repos.tasks.observe_pending_tasks();
    let mut medications = repos.medications.observe_medications_for_child("child1");
    let mut meals = repos.meals.observe_meals_for_child("child1");
    let mut checks = repos.health_checks.observe_health_checks_for_child("child3");

    assert!(timeout(WAIT, pending.next()).await.unwrap().unwrap().unwrap().is_empty());
    assert!(timeout(WAIT, medications.next()).await.unwrap().unwrap().unwrap().is_empty());
    assert!(timeout(WAIT, meals.next()).await.unwrap().unwrap().unwrap().is_empty());
    assert!(timeout(WAIT, checks.next()).await.unwrap().unwrap().unwrap().is_empty());

    seed_if_empty(&store, NOW).unwrap();

    let pending = timeout(WAIT, pending.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(pending.len(), 3);
    let medications = timeout(WAIT, medications.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(medications[0].id, "med1");
    let meals = timeout(WAIT, meals.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(meals[0].id, "meal1");
    let checks = timeout(WAIT, checks.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(checks[0].check_type, "Weight");
}

#[tokio::test]
async fn task_stream_reflects_completion() {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, NOW).unwrap();
    let repos = CareRepositories::from_store(&store);
    let mut tasks = repos.tasks.observe_tasks_for_child("child1");

    let before = timeout(WAIT, tasks.next()).await.unwrap().unwrap().unwrap();
    assert!(before.iter().all(|task| task.status == TaskStatus::Pending));

    repos.tasks.complete_task("task1", NOW + 1).unwrap();

    let after = timeout(WAIT, tasks.next()).await.unwrap().unwrap().unwrap();
    let task1 = after.iter().find(|task| task.id == "task1").unwrap();
    assert_eq!(task1.status, TaskStatus::Completed);
}

#[tokio::test]
async fn unrelated_table_writes_do_not_wake_child_stream() {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, NOW).unwrap();
    let repos = CareRepositories::from_store(&store);
    let mut medications = repos.medications.observe_medications_for_child("child2");
    timeout(WAIT, medications.next()).await.unwrap();

    repos
        .health_checks
        .record_check("health2", Some("18kg".to_string()), NOW + 1)
        .unwrap();

    assert!(timeout(Duration::from_millis(100), medications.next())
        .await
        .is_err());
}
