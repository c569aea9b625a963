//! Periodic task checker: reminders for upcoming tasks and misses for overdue
//! ones.

use super::reminder::ReminderScanner;
use super::{Notification, NotificationChannel, NotificationPriority, NotificationSink};
use crate::clock::now_epoch_ms;
use crate::repo::{CareRepositories, RepoError, RepoResult};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCheckerConfig {
    pub interval: Duration,
    /// How far ahead upcoming tasks are reminded.
    pub lookahead: Duration,
    /// How long a pending task may stay overdue before it is marked missed.
    pub missed_grace: Duration,
}

impl Default for TaskCheckerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            lookahead: Duration::from_secs(15 * 60),
            missed_grace: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reminders: usize,
    pub missed: usize,
}

pub struct TaskChecker {
    repos: CareRepositories,
    sink: Arc<dyn NotificationSink>,
    scanner: ReminderScanner,
    missed_grace_ms: i64,
}

impl TaskChecker {
    pub fn new(
        repos: CareRepositories,
        sink: Arc<dyn NotificationSink>,
        config: TaskCheckerConfig,
    ) -> Self {
        Self {
            scanner: ReminderScanner::new(repos.clone(), duration_ms(config.lookahead)),
            repos,
            sink,
            missed_grace_ms: duration_ms(config.missed_grace),
        }
    }

    /// Runs one check at `now_ms`.
    ///
    /// A listed task that a caretaker settled before it could be marked missed
    /// is skipped; the rest of the tick still runs.
    pub fn tick(&mut self, now_ms: i64) -> RepoResult<TickReport> {
        let mut report = TickReport::default();

        let cutoff = now_ms.saturating_sub(self.missed_grace_ms);
        let overdue = self
            .repos
            .tasks
            .list_pending_tasks()?
            .into_iter()
            .filter(|task| task.scheduled_time < cutoff);
        for task in overdue {
            let missed = match self.repos.tasks.miss_task(&task.id, now_ms) {
                Ok(missed) => missed,
                Err(err @ (RepoError::InvalidTransition { .. } | RepoError::NotFound { .. })) => {
                    debug!(
                        "event=task_check module=notify status=skipped task_id={} error={err}",
                        task.id
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            self.sink.notify(Notification {
                channel: NotificationChannel::System,
                title: format!("Missed: {}", missed.title),
                message: "The task was not completed in time.".to_string(),
                priority: NotificationPriority::High,
                task_id: Some(missed.id),
            });
            report.missed += 1;
        }

        for reminder in self.scanner.scan(now_ms)? {
            self.sink.notify(reminder);
            report.reminders += 1;
        }

        if report != TickReport::default() {
            info!(
                "event=task_check module=notify status=ok reminders={} missed={}",
                report.reminders, report.missed
            );
        }
        Ok(report)
    }
}

/// Runs `checker` every `interval` until the returned handle is aborted.
///
/// Must be called from within a tokio runtime.
pub fn spawn_task_checker(mut checker: TaskChecker, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = checker.tick(now_epoch_ms()) {
                warn!("event=task_check module=notify status=error error={err}");
            }
        }
    })
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
