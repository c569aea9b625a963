use carewatch_core::clock::now_epoch_ms;
use carewatch_core::notify::{
    spawn_task_checker, CollectingSink, NotificationChannel, NotificationPriority,
    ReminderScanner, TaskChecker, TaskCheckerConfig,
};
use carewatch_core::repo::{CareRepositories, RepoResult, RepoStream, TaskRepository};
use carewatch_core::sync::seed_if_empty;
use carewatch_core::{CacheStore, CareTask, TaskStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_700_000_000_000;
const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

fn seeded_repos(now_ms: i64) -> CareRepositories {
    let store = CacheStore::open_in_memory().unwrap();
    seed_if_empty(&store, now_ms).unwrap();
    CareRepositories::from_store(&store)
}

/// Completes the earliest pending task right after the first listing, the way
/// a caretaker acting between the checker's read and its write would.
struct CompletesAfterListing {
    inner: Arc<dyn TaskRepository>,
    fired: AtomicBool,
}

impl TaskRepository for CompletesAfterListing {
    fn get_task(&self, id: &str) -> RepoResult<CareTask> {
        self.inner.get_task(id)
    }

    fn list_tasks_for_child(&self, child_id: &str) -> RepoResult<Vec<CareTask>> {
        self.inner.list_tasks_for_child(child_id)
    }

    fn list_pending_tasks(&self) -> RepoResult<Vec<CareTask>> {
        let pending = self.inner.list_pending_tasks()?;
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(first) = pending.first() {
                self.inner.complete_task(&first.id, NOW)?;
            }
        }
        Ok(pending)
    }

    fn observe_tasks_for_child(&self, child_id: &str) -> RepoStream<Vec<CareTask>> {
        self.inner.observe_tasks_for_child(child_id)
    }

    fn observe_pending_tasks(&self) -> RepoStream<Vec<CareTask>> {
        self.inner.observe_pending_tasks()
    }

    fn complete_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask> {
        self.inner.complete_task(id, now_ms)
    }

    fn miss_task(&self, id: &str, now_ms: i64) -> RepoResult<CareTask> {
        self.inner.miss_task(id, now_ms)
    }

    fn reschedule_task(&self, id: &str, scheduled_time: i64) -> RepoResult<CareTask> {
        self.inner.reschedule_task(id, scheduled_time)
    }
}

fn hour_window() -> TaskCheckerConfig {
    TaskCheckerConfig {
        lookahead: Duration::from_secs(60 * 60),
        ..TaskCheckerConfig::default()
    }
}

#[test]
fn scan_reminds_due_tasks_once_and_escalates_critical_medication() {
    let repos = seeded_repos(NOW);
    let mut scanner = ReminderScanner::new(repos, HOUR_MS);

    let reminders = scanner.scan(NOW).unwrap();
    assert_eq!(reminders.len(), 1);
    let reminder = &reminders[0];
    assert_eq!(reminder.title, "Give Tylenol");
    assert_eq!(reminder.message, "Sarah Johnson: due in 30 min");
    assert_eq!(reminder.channel, NotificationChannel::Medication);
    assert_eq!(reminder.priority, NotificationPriority::Critical);
    assert_eq!(reminder.task_id.as_deref(), Some("task1"));

    assert!(scanner.scan(NOW + MINUTE_MS).unwrap().is_empty());
}

#[test]
fn rescheduled_task_is_reminded_again() {
    let repos = seeded_repos(NOW);
    let mut scanner = ReminderScanner::new(repos.clone(), HOUR_MS);
    assert_eq!(scanner.scan(NOW).unwrap().len(), 1);

    repos
        .tasks
        .reschedule_task("task1", NOW + 45 * MINUTE_MS)
        .unwrap();

    let reminders = scanner.scan(NOW).unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].message, "Sarah Johnson: due in 45 min");
}

#[test]
fn tick_marks_overdue_tasks_missed_and_reminds_upcoming() {
    let repos = seeded_repos(NOW);
    let sink = Arc::new(CollectingSink::new());
    let mut checker = TaskChecker::new(repos.clone(), sink.clone(), hour_window());

    let report = checker.tick(NOW + 3 * HOUR_MS).unwrap();

    assert_eq!(report.missed, 1);
    assert_eq!(report.reminders, 1);
    assert_eq!(repos.tasks.get_task("task1").unwrap().status, TaskStatus::Missed);
    assert_eq!(repos.tasks.get_task("task2").unwrap().status, TaskStatus::Pending);

    let sent = sink.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].channel, NotificationChannel::System);
    assert_eq!(sent[0].title, "Missed: Give Tylenol");
    assert_eq!(sent[1].title, "Vitamin D");
    assert_eq!(sent[1].message, "Michael Chen: due in 60 min");
    assert_eq!(sent[1].priority, NotificationPriority::Normal);
}

#[test]
fn tick_skips_task_completed_after_listing_and_misses_the_rest() {
    let seeded = seeded_repos(NOW);
    let repos = CareRepositories {
        tasks: Arc::new(CompletesAfterListing {
            inner: seeded.tasks.clone(),
            fired: AtomicBool::new(false),
        }),
        ..seeded.clone()
    };
    let sink = Arc::new(CollectingSink::new());
    let mut checker = TaskChecker::new(repos, sink.clone(), hour_window());

    let report = checker.tick(NOW + 24 * HOUR_MS).unwrap();

    assert_eq!(report.missed, 2);
    assert_eq!(seeded.tasks.get_task("task1").unwrap().status, TaskStatus::Completed);
    assert_eq!(seeded.tasks.get_task("task2").unwrap().status, TaskStatus::Missed);
    assert_eq!(seeded.tasks.get_task("task3").unwrap().status, TaskStatus::Missed);
    let titles = sink.take().into_iter().map(|sent| sent.title).collect::<Vec<_>>();
    assert_eq!(titles, vec!["Missed: Serve Lunch", "Missed: Vitamin D"]);
}

#[test]
fn tick_leaves_already_settled_tasks_alone() {
    let repos = seeded_repos(NOW);
    repos.tasks.complete_task("task1", NOW).unwrap();
    let sink = Arc::new(CollectingSink::new());
    let mut checker = TaskChecker::new(repos.clone(), sink.clone(), hour_window());

    let report = checker.tick(NOW + 3 * HOUR_MS).unwrap();

    assert_eq!(report.missed, 0);
    assert_eq!(repos.tasks.get_task("task1").unwrap().status, TaskStatus::Completed);
    assert!(sink.take().iter().all(|sent| !sent.title.starts_with("Missed")));
}

#[test]
fn scanner_forgets_reminders_once_their_time_has_passed() {
    let repos = seeded_repos(NOW);
    let mut scanner = ReminderScanner::new(repos, HOUR_MS);

    assert_eq!(scanner.scan(NOW).unwrap().len(), 1);
    assert_eq!(scanner.remembered(), 1);

    assert!(scanner.scan(NOW + 31 * MINUTE_MS).unwrap().is_empty());
    assert_eq!(scanner.remembered(), 0);
}

#[test]
fn quiet_tick_sends_nothing() {
    let repos = seeded_repos(NOW);
    let sink = Arc::new(CollectingSink::new());
    let mut checker = TaskChecker::new(repos, sink.clone(), TaskCheckerConfig::default());

    let report = checker.tick(NOW).unwrap();

    assert_eq!(report.missed, 0);
    assert_eq!(report.reminders, 0);
    assert!(sink.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn spawned_checker_ticks_until_aborted() {
    let repos = seeded_repos(now_epoch_ms());
    let sink = Arc::new(CollectingSink::new());
    let checker = TaskChecker::new(repos, sink.clone(), hour_window());

    let handle = spawn_task_checker(checker, Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Give Tylenol");

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}
