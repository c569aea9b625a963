//! Child detail screen and its caretaker actions.

use super::{
    action_message, fold_update, run_blocking, settle, LoadPolicy, UiEvent, UiState,
    ViewModelScope,
};
use crate::clock::now_epoch_ms;
use crate::model::care_task::CareTask;
use crate::model::child::Child;
use crate::model::health_check::HealthCheck;
use crate::model::meal::Meal;
use crate::model::medication::Medication;
use crate::repo::{CareRepositories, RepoError, RepoResult, RepoStream};
use crate::sync::seed::sample_dataset;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDetail {
    pub child: Child,
    pub tasks: Vec<CareTask>,
    pub medications: Vec<Medication>,
    pub meals: Vec<Meal>,
    pub health_checks: Vec<HealthCheck>,
}

pub struct ChildDetailViewModel {
    child_id: String,
    repos: CareRepositories,
    policy: LoadPolicy,
    state: Arc<watch::Sender<UiState<ChildDetail>>>,
    events: mpsc::UnboundedSender<UiEvent>,
    scope: ViewModelScope,
}

impl ChildDetailViewModel {
    pub fn new(
        child_id: impl Into<String>,
        repos: CareRepositories,
        policy: LoadPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (state, _) = watch::channel(UiState::Loading);
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                child_id: child_id.into(),
                repos,
                policy,
                state: Arc::new(state),
                events,
                scope: ViewModelScope::new(),
            },
            events_rx,
        )
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    pub fn state(&self) -> watch::Receiver<UiState<ChildDetail>> {
        self.state.subscribe()
    }

    /// Starts following every stream the screen renders.
    pub fn start(&self) {
        let policy = self.policy;
        let child_id = self.child_id.clone();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let mut streams = DetailStreams::open(&self.repos, &child_id);

        self.scope.launch(async move {
            let Some(mut snapshot) = streams.first().await else {
                return;
            };
            loop {
                let next = match snapshot.resolve(&child_id) {
                    Ok(Some(detail)) => UiState::Loaded(detail),
                    Ok(None) => UiState::Error("Child not found".to_string()),
                    Err(err) if err.is_not_found() => UiState::Error("Child not found".to_string()),
                    Err(err) => settle(
                        Err(err),
                        policy,
                        || fallback_detail(&child_id),
                        |_| "Could not load child".to_string(),
                        &events,
                    ),
                };
                state.send_replace(next);
                if !streams.advance(&mut snapshot).await {
                    break;
                }
            }
        });
    }

    pub fn complete_task(&self, task_id: &str) {
        self.run_action(task_id, |repos, id| {
            let task = repos.tasks.complete_task(id, now_epoch_ms())?;
            Ok(format!("{} completed", task.title))
        });
    }

    pub fn miss_task(&self, task_id: &str) {
        self.run_action(task_id, |repos, id| {
            let task = repos.tasks.miss_task(id, now_epoch_ms())?;
            Ok(format!("{} marked as missed", task.title))
        });
    }

    pub fn reschedule_task(&self, task_id: &str, scheduled_time: i64) {
        self.run_action(task_id, move |repos, id| {
            let task = repos.tasks.reschedule_task(id, scheduled_time)?;
            Ok(format!("{} rescheduled", task.title))
        });
    }

    pub fn mark_medication_administered(&self, medication_id: &str) {
        self.run_action(medication_id, |repos, id| {
            let medication = repos.medications.mark_administered(id, now_epoch_ms())?;
            Ok(format!("{} administered", medication.name))
        });
    }

    pub fn mark_meal_served(&self, meal_id: &str) {
        self.run_action(meal_id, |repos, id| {
            let meal = repos.meals.mark_served(id, now_epoch_ms())?;
            Ok(format!("{} served", meal.meal_type))
        });
    }

    pub fn record_health_check(&self, check_id: &str, notes: Option<String>) {
        self.run_action(check_id, move |repos, id| {
            let check = repos
                .health_checks
                .record_check(id, notes, now_epoch_ms())?;
            Ok(format!("{} recorded", check.check_type))
        });
    }

    pub fn navigate_back(&self) {
        let _ = self.events.send(UiEvent::NavigateBack);
    }

    fn run_action<F>(&self, target_id: &str, action: F)
    where
        F: FnOnce(&CareRepositories, &str) -> Result<String, RepoError> + Send + 'static,
    {
        let repos = self.repos.clone();
        let events = self.events.clone();
        let target_id = target_id.to_string();
        self.scope.launch(async move {
            let target = target_id.clone();
            let Some(result) = run_blocking(move || action(&repos, &target)).await else {
                return;
            };
            if let Err(err) = &result {
                log::warn!(
                    "event=care_action module=viewmodel status=error target={target_id} error={err}"
                );
            }
            let _ = events.send(action_message(result));
        });
    }
}

struct DetailStreams {
    children: RepoStream<Vec<Child>>,
    tasks: RepoStream<Vec<CareTask>>,
    medications: RepoStream<Vec<Medication>>,
    meals: RepoStream<Vec<Meal>>,
    health_checks: RepoStream<Vec<HealthCheck>>,
}

/// Latest value of every stream the screen folds together.
struct DetailSnapshot {
    children: RepoResult<Vec<Child>>,
    tasks: RepoResult<Vec<CareTask>>,
    medications: RepoResult<Vec<Medication>>,
    meals: RepoResult<Vec<Meal>>,
    health_checks: RepoResult<Vec<HealthCheck>>,
}

impl DetailStreams {
    fn open(repos: &CareRepositories, child_id: &str) -> Self {
        Self {
            children: repos.children.observe_children(),
            tasks: repos.tasks.observe_tasks_for_child(child_id),
            medications: repos.medications.observe_medications_for_child(child_id),
            meals: repos.meals.observe_meals_for_child(child_id),
            health_checks: repos.health_checks.observe_health_checks_for_child(child_id),
        }
    }

    async fn first(&mut self) -> Option<DetailSnapshot> {
        Some(DetailSnapshot {
            children: self.children.next().await?,
            tasks: self.tasks.next().await?,
            medications: self.medications.next().await?,
            meals: self.meals.next().await?,
            health_checks: self.health_checks.next().await?,
        })
    }

    /// Waits for the next emission of any stream and folds it in. Returns
    /// `false` once a stream ended.
    async fn advance(&mut self, snapshot: &mut DetailSnapshot) -> bool {
        tokio::select! {
            update = self.children.next() => fold_update(&mut snapshot.children, update),
            update = self.tasks.next() => fold_update(&mut snapshot.tasks, update),
            update = self.medications.next() => fold_update(&mut snapshot.medications, update),
            update = self.meals.next() => fold_update(&mut snapshot.meals, update),
            update = self.health_checks.next() => fold_update(&mut snapshot.health_checks, update),
        }
    }
}

impl DetailSnapshot {
    /// `Ok(None)` when the child is not in the cache.
    fn resolve(&self, child_id: &str) -> Result<Option<ChildDetail>, &RepoError> {
        let Some(child) = self
            .children
            .as_ref()?
            .iter()
            .find(|child| child.id == child_id)
        else {
            return Ok(None);
        };
        Ok(Some(ChildDetail {
            child: child.clone(),
            tasks: self.tasks.as_ref()?.clone(),
            medications: self.medications.as_ref()?.clone(),
            meals: self.meals.as_ref()?.clone(),
            health_checks: self.health_checks.as_ref()?.clone(),
        }))
    }
}

fn fallback_detail(child_id: &str) -> Option<ChildDetail> {
    let data = sample_dataset(now_epoch_ms());
    let child = data.children.into_iter().find(|child| child.id == child_id)?;
    let owned_by = |id: &str| id == child_id;
    Some(ChildDetail {
        child,
        tasks: data
            .tasks
            .into_iter()
            .filter(|task| owned_by(&task.child_id))
            .collect(),
        medications: data
            .medications
            .into_iter()
            .filter(|medication| owned_by(&medication.child_id))
            .collect(),
        meals: data
            .meals
            .into_iter()
            .filter(|meal| owned_by(&meal.child_id))
            .collect(),
        health_checks: data
            .health_checks
            .into_iter()
            .filter(|check| owned_by(&check.child_id))
            .collect(),
    })
}
