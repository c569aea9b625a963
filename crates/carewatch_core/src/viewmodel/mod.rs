//! Per-screen reactive state holders.
//!
//! # Responsibility
//! - Fold repository streams into one UI state value per screen.
//! - Emit one-shot events (navigation, transient messages).
//! - Decide, per screen, whether a failed load shows an error or the sample
//!   dataset.
//!
//! # Invariants
//! - Initial state is always `UiState::Loading`.
//! - Work launched by a view-model is aborted when the view-model is dropped.
//! - Repository calls run on tokio's blocking pool, never on a runtime worker.

use crate::repo::{RepoError, RepoResult};
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod child_detail;
pub mod dashboard;

pub use child_detail::{ChildDetail, ChildDetailViewModel};
pub use dashboard::{ChildSummary, DashboardState, DashboardViewModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState<T> {
    Loading,
    Loaded(T),
    Error(String),
}

impl<T> UiState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Loading | Self::Error(_) => None,
        }
    }
}

/// One-shot UI events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ShowMessage(String),
    NavigateToChild(String),
    NavigateBack,
}

/// What a screen shows when its data cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Show `UiState::Error` with a friendly message.
    SurfaceError,
    /// Show the sample dataset and announce it with a message.
    UseFallback,
}

/// Owns the tasks a view-model launches.
#[derive(Default)]
pub struct ViewModelScope {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ViewModelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `work` on the current tokio runtime, tied to this scope.
    pub fn launch<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|handle| !handle.is_finished());
            handles.push(handle);
        }
    }

    pub fn active(&self) -> usize {
        self.handles
            .lock()
            .map(|handles| handles.iter().filter(|handle| !handle.is_finished()).count())
            .unwrap_or(0)
    }

    /// Aborts every launched task.
    pub fn cancel(&self) {
        if let Ok(mut handles) = self.handles.lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Drop for ViewModelScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Resolves a load result into UI state under `policy`.
///
/// `fallback` is consulted only for `LoadPolicy::UseFallback`; returning
/// `None` there still surfaces the error.
pub(crate) fn settle<T>(
    result: Result<T, &RepoError>,
    policy: LoadPolicy,
    fallback: impl FnOnce() -> Option<T>,
    error_message: impl FnOnce(&RepoError) -> String,
    events: &mpsc::UnboundedSender<UiEvent>,
) -> UiState<T> {
    match result {
        Ok(value) => UiState::Loaded(value),
        Err(err) => {
            log::warn!("event=screen_load module=viewmodel status=error error={err}");
            if policy == LoadPolicy::UseFallback {
                if let Some(value) = fallback() {
                    let _ = events.send(UiEvent::ShowMessage(
                        "Showing sample data while offline".to_string(),
                    ));
                    return UiState::Loaded(value);
                }
            }
            UiState::Error(error_message(err))
        }
    }
}

/// Stores a stream update in `slot`. Returns `false` once the stream ended.
pub(crate) fn fold_update<T>(slot: &mut RepoResult<T>, update: Option<RepoResult<T>>) -> bool {
    match update {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Runs a blocking repository call off the async worker threads.
///
/// Returns `None` when the call could not finish (runtime shutdown).
pub(crate) async fn run_blocking<R, F>(call: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(value) => Some(value),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            log::warn!("event=blocking_call module=viewmodel status=cancelled error={err}");
            None
        }
    }
}

pub(crate) fn action_message(result: Result<String, RepoError>) -> UiEvent {
    match result {
        Ok(message) => UiEvent::ShowMessage(message),
        Err(err) => UiEvent::ShowMessage(format!("Action failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{fold_update, settle, LoadPolicy, UiEvent, UiState, ViewModelScope};
    use crate::cache::CacheError;
    use crate::repo::{RepoError, RepoResult};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn failure() -> RepoError {
        RepoError::Cache(CacheError::LockPoisoned)
    }

    #[test]
    fn settle_prefers_loaded_value() {
        let (events, mut rx) = mpsc::unbounded_channel();
        let state = settle(Ok(7), LoadPolicy::UseFallback, || Some(1), |_| "x".into(), &events);
        assert_eq!(state, UiState::Loaded(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn settle_applies_policy_on_failure() {
        let (events, mut rx) = mpsc::unbounded_channel();

        let err = failure();

        let surfaced = settle(Err(&err), LoadPolicy::SurfaceError, || Some(1), |_| "boom".into(), &events);
        assert_eq!(surfaced, UiState::Error("boom".to_string()));
        assert!(rx.try_recv().is_err());

        let fallback = settle(Err(&err), LoadPolicy::UseFallback, || Some(1), |_| "boom".into(), &events);
        assert_eq!(fallback, UiState::Loaded(1));
        assert!(matches!(rx.try_recv(), Ok(UiEvent::ShowMessage(_))));

        let no_fallback: UiState<i32> = settle(Err(&err), LoadPolicy::UseFallback, || None, |_| "boom".into(), &events);
        assert_eq!(no_fallback, UiState::Error("boom".to_string()));
    }

    #[test]
    fn fold_update_keeps_latest_value_until_stream_ends() {
        let mut slot: RepoResult<u32> = Err(failure());

        assert!(fold_update(&mut slot, Some(Ok(3))));
        assert_eq!(slot.as_ref().ok(), Some(&3));

        assert!(!fold_update(&mut slot, None));
        assert_eq!(slot.as_ref().ok(), Some(&3));
    }

    #[tokio::test]
    async fn cancel_aborts_launched_work() {
        let scope = ViewModelScope::new();
        scope.launch(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(scope.active(), 1);

        scope.cancel();
        assert_eq!(scope.active(), 0);
    }
}
