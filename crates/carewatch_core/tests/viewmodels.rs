use carewatch_core::cache::{CacheError, ChangeFeed, LiveQuery};
use carewatch_core::repo::{CareRepositories, ChildRepository, RepoError, RepoResult, RepoStream};
use carewatch_core::sync::seed_if_empty;
use carewatch_core::viewmodel::{
    ChildDetailViewModel, DashboardViewModel, LoadPolicy, UiEvent, UiState,
};
use carewatch_core::{CacheStore, Child, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

const NOW: i64 = 1_700_000_000_000;
const WAIT: Duration = Duration::from_secs(2);

struct BrokenChildren;

impl ChildRepository for BrokenChildren {
    fn get_child(&self, _id: &str) -> RepoResult<Child> {
        Err(RepoError::Cache(CacheError::LockPoisoned))
    }

    fn list_children(&self) -> RepoResult<Vec<Child>> {
        Err(RepoError::Cache(CacheError::LockPoisoned))
    }

    fn observe_children(&self) -> RepoStream<Vec<Child>> {
        LiveQuery::new(ChangeFeed::new().subscribe(&[]), || {
            Err(RepoError::Cache(CacheError::LockPoisoned))
        })
    }
}

fn broken_repositories(store: &CacheStore) -> CareRepositories {
    CareRepositories {
        children: Arc::new(BrokenChildren),
        ..CareRepositories::from_store(store)
    }
}

async fn settled<T: Clone>(rx: &mut watch::Receiver<UiState<T>>) -> UiState<T> {
    timeout(WAIT, rx.wait_for(|state| !state.is_loading()))
        .await
        .expect("state should settle")
        .expect("view-model alive")
        .clone()
}

#[tokio::test]
async fn dashboard_moves_from_loading_to_loaded_and_follows_changes() {
    let store = CacheStore::open_in_memory().unwrap();
    let (vm, _events) =
        DashboardViewModel::new(CareRepositories::from_store(&store), LoadPolicy::SurfaceError);
    let mut state = vm.state();
    assert!(state.borrow().is_loading());

    vm.start();
    let loaded = settled(&mut state).await;
    assert!(loaded.loaded().unwrap().children.is_empty());

    seed_if_empty(&store, NOW).unwrap();
    let refreshed = timeout(
        WAIT,
        state.wait_for(|state| state.loaded().is_some_and(|data| data.children.len() == 3)),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    let dashboard = refreshed.loaded().unwrap();
    assert!(!dashboard.is_fallback);
    let sarah = dashboard
        .children
        .iter()
        .find(|child| child.id == "child1")
        .unwrap();
    assert_eq!(sarah.pending_tasks, 2);
    assert_eq!(sarah.next_task.as_deref(), Some("Give Tylenol"));
}

#[tokio::test]
async fn dashboard_surfaces_error_under_surface_policy() {
    let store = CacheStore::open_in_memory().unwrap();
    let (vm, _events) = DashboardViewModel::new(broken_repositories(&store), LoadPolicy::SurfaceError);
    let mut state = vm.state();

    vm.start();

    assert_eq!(
        settled(&mut state).await,
        UiState::Error("Could not load children".to_string())
    );
}

#[tokio::test]
async fn dashboard_uses_sample_data_under_fallback_policy() {
    let store = CacheStore::open_in_memory().unwrap();
    let (vm, mut events) = DashboardViewModel::new(broken_repositories(&store), LoadPolicy::UseFallback);
    let mut state = vm.state();

    vm.start();

    let settled = settled(&mut state).await;
    let dashboard = settled.loaded().expect("fallback data");
    assert!(dashboard.is_fallback);
    assert_eq!(dashboard.children.len(), 3);
    assert!(matches!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(UiEvent::ShowMessage(_))
    ));
}

#[tokio::test]
async fn select_child_navigates_or_reports_missing_child() {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, NOW).unwrap();
    let (vm, mut events) =
        DashboardViewModel::new(CareRepositories::from_store(&store), LoadPolicy::SurfaceError);

    vm.select_child("child2");
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(UiEvent::NavigateToChild("child2".to_string()))
    );

    vm.select_child("ghost");
    assert!(matches!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(UiEvent::ShowMessage(_))
    ));
}

#[tokio::test]
async fn child_detail_reports_missing_child_regardless_of_policy() {
    let store = CacheStore::open_in_memory().unwrap();
    let (vm, _events) = ChildDetailViewModel::new(
        "child1",
        CareRepositories::from_store(&store),
        LoadPolicy::UseFallback,
    );
    let mut state = vm.state();

    vm.start();

    assert_eq!(
        settled(&mut state).await,
        UiState::Error("Child not found".to_string())
    );
}

#[tokio::test]
async fn child_detail_complete_task_updates_state_and_emits_message() {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, NOW).unwrap();
    let (vm, mut events) = ChildDetailViewModel::new(
        "child1",
        CareRepositories::from_store(&store),
        LoadPolicy::SurfaceError,
    );
    let mut state = vm.state();
    vm.start();

    let detail = settled(&mut state).await;
    let detail = detail.loaded().unwrap();
    assert_eq!(detail.child.name, "Sarah Johnson");
    assert_eq!(detail.tasks.len(), 2);
    assert_eq!(detail.medications.len(), 1);
    assert_eq!(detail.meals[0].allergies, "Peanuts");

    vm.complete_task("task1");

    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(UiEvent::ShowMessage("Give Tylenol completed".to_string()))
    );
    timeout(
        WAIT,
        state.wait_for(|state| {
            state.loaded().is_some_and(|detail| {
                detail
                    .tasks
                    .iter()
                    .any(|task| task.id == "task1" && task.status == TaskStatus::Completed)
                    && detail.medications[0].last_administered.is_some()
            })
        }),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn child_detail_failed_action_emits_message() {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, NOW).unwrap();
    let (vm, mut events) = ChildDetailViewModel::new(
        "child1",
        CareRepositories::from_store(&store),
        LoadPolicy::SurfaceError,
    );

    vm.mark_meal_served("no-such-meal");

    match timeout(WAIT, events.recv()).await.unwrap() {
        Some(UiEvent::ShowMessage(message)) => assert!(message.starts_with("Action failed")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn dropping_view_model_stops_its_loop() {
    let store = CacheStore::open_in_memory().unwrap();
    let (vm, _events) =
        DashboardViewModel::new(CareRepositories::from_store(&store), LoadPolicy::SurfaceError);
    let mut state = vm.state();
    vm.start();
    settled(&mut state).await;

    drop(vm);

    assert!(timeout(WAIT, state.changed()).await.unwrap().is_err());
}
