//! Dashboard screen: every child with a pending-task summary.

use super::{fold_update, run_blocking, settle, LoadPolicy, UiEvent, UiState, ViewModelScope};
use crate::clock::now_epoch_ms;
use crate::model::care_task::CareTask;
use crate::model::child::Child;
use crate::repo::{CareRepositories, RepoError, RepoResult};
use crate::sync::seed::sample_dataset;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSummary {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub pending_tasks: usize,
    /// Title of the earliest pending task.
    pub next_task: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub children: Vec<ChildSummary>,
    /// Set when the screen shows the sample dataset instead of cached data.
    pub is_fallback: bool,
}

pub struct DashboardViewModel {
    repos: CareRepositories,
    policy: LoadPolicy,
    state: Arc<watch::Sender<UiState<DashboardState>>>,
    events: mpsc::UnboundedSender<UiEvent>,
    scope: ViewModelScope,
}

impl DashboardViewModel {
    pub fn new(
        repos: CareRepositories,
        policy: LoadPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (state, _) = watch::channel(UiState::Loading);
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                repos,
                policy,
                state: Arc::new(state),
                events,
                scope: ViewModelScope::new(),
            },
            events_rx,
        )
    }

    pub fn state(&self) -> watch::Receiver<UiState<DashboardState>> {
        self.state.subscribe()
    }

    /// Starts following the children and pending-task streams. Call once,
    /// inside a runtime.
    pub fn start(&self) {
        let policy = self.policy;
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let mut children_stream = self.repos.children.observe_children();
        let mut pending_stream = self.repos.tasks.observe_pending_tasks();

        self.scope.launch(async move {
            let (Some(mut children), Some(mut pending)) =
                (children_stream.next().await, pending_stream.next().await)
            else {
                return;
            };
            loop {
                let next = settle(
                    summarize_loaded(&children, &pending),
                    policy,
                    || Some(fallback_dashboard()),
                    |_| "Could not load children".to_string(),
                    &events,
                );
                state.send_replace(next);

                let open = tokio::select! {
                    update = children_stream.next() => fold_update(&mut children, update),
                    update = pending_stream.next() => fold_update(&mut pending, update),
                };
                if !open {
                    break;
                }
            }
        });
    }

    /// Navigates to a child, or reports that it no longer exists.
    pub fn select_child(&self, child_id: &str) {
        let repos = self.repos.clone();
        let events = self.events.clone();
        let child_id = child_id.to_string();
        self.scope.launch(async move {
            let Some(lookup) = run_blocking(move || repos.children.get_child(&child_id)).await
            else {
                return;
            };
            let event = match lookup {
                Ok(child) => UiEvent::NavigateToChild(child.id),
                Err(err) if err.is_not_found() => {
                    UiEvent::ShowMessage("That child is no longer available".to_string())
                }
                Err(err) => UiEvent::ShowMessage(format!("Could not open child: {err}")),
            };
            let _ = events.send(event);
        });
    }
}

fn summarize_loaded<'a>(
    children: &'a RepoResult<Vec<Child>>,
    pending: &'a RepoResult<Vec<CareTask>>,
) -> Result<DashboardState, &'a RepoError> {
    Ok(DashboardState {
        children: summarize(children.as_ref()?, pending.as_ref()?),
        is_fallback: false,
    })
}

fn fallback_dashboard() -> DashboardState {
    let data = sample_dataset(now_epoch_ms());
    DashboardState {
        children: summarize(&data.children, &data.tasks),
        is_fallback: true,
    }
}

fn summarize(children: &[Child], tasks: &[CareTask]) -> Vec<ChildSummary> {
    let mut by_child: HashMap<&str, Vec<&CareTask>> = HashMap::new();
    for task in tasks.iter().filter(|task| task.is_pending()) {
        by_child.entry(task.child_id.as_str()).or_default().push(task);
    }

    children
        .iter()
        .map(|child| {
            let pending = by_child.get(child.id.as_str());
            ChildSummary {
                id: child.id.clone(),
                name: child.name.clone(),
                age: child.age,
                pending_tasks: pending.map_or(0, Vec::len),
                next_task: pending
                    .and_then(|tasks| tasks.iter().min_by_key(|task| task.scheduled_time))
                    .map(|task| task.title.clone()),
            }
        })
        .collect()
}
