//! Upcoming-task reminder scan.

use super::{Notification, NotificationChannel, NotificationPriority};
use crate::model::care_task::{CareTask, TaskKind};
use crate::repo::{CareRepositories, RepoResult};
use std::collections::{HashMap, HashSet};

const MINUTE_MS: i64 = 60 * 1000;

pub struct ReminderScanner {
    repos: CareRepositories,
    lookahead_ms: i64,
    reminded: HashSet<(String, i64)>,
}

impl ReminderScanner {
    pub fn new(repos: CareRepositories, lookahead_ms: i64) -> Self {
        Self {
            repos,
            lookahead_ms: lookahead_ms.max(0),
            reminded: HashSet::new(),
        }
    }

    /// Returns reminders for pending tasks due in `[now, now + lookahead]`
    /// that were not reminded before at the same scheduled time.
    pub fn scan(&mut self, now_ms: i64) -> RepoResult<Vec<Notification>> {
        self.reminded
            .retain(|(_, scheduled_time)| *scheduled_time >= now_ms);

        let window_end = now_ms.saturating_add(self.lookahead_ms);
        let due = self
            .repos
            .tasks
            .list_pending_tasks()?
            .into_iter()
            .filter(|task| task.scheduled_time >= now_ms && task.scheduled_time <= window_end)
            .filter(|task| {
                !self
                    .reminded
                    .contains(&(task.id.clone(), task.scheduled_time))
            })
            .collect::<Vec<_>>();

        let mut child_names: HashMap<String, String> = HashMap::new();
        let mut notifications = Vec::with_capacity(due.len());
        for task in due {
            if !child_names.contains_key(&task.child_id) {
                let name = self.repos.children.get_child(&task.child_id)?.name;
                child_names.insert(task.child_id.clone(), name);
            }
            let child_name = child_names
                .get(&task.child_id)
                .map(String::as_str)
                .unwrap_or_default();

            let priority = self.priority_for(&task)?;
            let minutes = (task.scheduled_time - now_ms) / MINUTE_MS;
            notifications.push(Notification {
                channel: NotificationChannel::for_task(task.kind),
                title: task.title.clone(),
                message: if minutes == 0 {
                    format!("{child_name}: due now")
                } else {
                    format!("{child_name}: due in {minutes} min")
                },
                priority,
                task_id: Some(task.id.clone()),
            });
            self.reminded.insert((task.id, task.scheduled_time));
        }

        Ok(notifications)
    }

    /// Number of `(task, scheduled time)` pairs still remembered as reminded.
    pub fn remembered(&self) -> usize {
        self.reminded.len()
    }

    fn priority_for(&self, task: &CareTask) -> RepoResult<NotificationPriority> {
        let base = NotificationPriority::from(task.priority);
        if task.kind != TaskKind::Medication {
            return Ok(base);
        }
        let Some(source_id) = task.source_id.as_deref() else {
            return Ok(base);
        };
        match self.repos.medications.get_medication(source_id) {
            Ok(medication) if medication.is_critical => Ok(NotificationPriority::Critical),
            Ok(_) => Ok(base),
            Err(err) if err.is_not_found() => Ok(base),
            Err(err) => Err(err),
        }
    }
}
