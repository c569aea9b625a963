//! Caretaker notifications derived from cached tasks.
//!
//! # Responsibility
//! - Define the notification shape handed to the platform surface.
//! - Scan pending tasks for upcoming reminders and overdue misses.
//!
//! # Invariants
//! - A task is reminded at most once per scheduled time.
//! - Notification delivery is fire-and-forget; sinks never fail the scan.

use crate::model::care_task::{Priority, TaskKind};
use std::sync::Mutex;

pub mod checker;
pub mod reminder;

pub use checker::{spawn_task_checker, TaskChecker, TaskCheckerConfig, TickReport};
pub use reminder::ReminderScanner;

/// Platform notification channel category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationChannel {
    Medication,
    Meal,
    Health,
    System,
}

impl NotificationChannel {
    /// Stable channel id registered by the platform layer.
    pub fn id(self) -> &'static str {
        match self {
            Self::Medication => "medication_reminders",
            Self::Meal => "meal_reminders",
            Self::Health => "health_reminders",
            Self::System => "system_alerts",
        }
    }

    pub fn for_task(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Medication => Self::Medication,
            TaskKind::Meal => Self::Meal,
            TaskKind::Health => Self::Health,
        }
    }
}

/// 0 normal, 1 high, 2 critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationPriority {
    Normal,
    High,
    Critical,
}

impl NotificationPriority {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
            Self::Critical => 2,
        }
    }
}

impl From<Priority> for NotificationPriority {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Normal => Self::Normal,
            Priority::High => Self::High,
            Priority::Critical => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    /// Task the notification refers to, when any.
    pub task_id: Option<String>,
}

/// Receives notifications for display.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that keeps notifications in memory.
#[derive(Default)]
pub struct CollectingSink {
    received: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything received so far.
    pub fn take(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|mut received| std::mem::take(&mut *received))
            .unwrap_or_default()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification);
        }
    }
}
