//! Deterministic fallback dataset used before any host data arrives.
//!
//! Row ids and contents are fixed; scheduled times are offsets from the
//! moment of seeding.

use crate::cache::{
    children, count_rows, health_checks, meals, medications, tasks, CacheError, CacheResult,
    CacheStore,
    CacheTable, UpsertMode, UpsertOutcome,
};
use crate::model::care_task::{CareTask, Priority, TaskKind, TaskStatus};
use crate::model::child::Child;
use crate::model::health_check::HealthCheck;
use crate::model::meal::Meal;
use crate::model::medication::Medication;
use log::info;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedData {
    pub children: Vec<Child>,
    pub tasks: Vec<CareTask>,
    pub medications: Vec<Medication>,
    pub meals: Vec<Meal>,
    pub health_checks: Vec<HealthCheck>,
}

/// Builds the sample dataset: 3 children, 3 tasks, 2 medications, 2 meals and
/// 2 health checks.
pub fn sample_dataset(now_ms: i64) -> SeedData {
    let child = |id: &str, name: &str, age: u32, pending: bool| Child {
        has_pending_tasks: pending,
        ..Child::new(id, name, age, now_ms)
    };

    SeedData {
        children: vec![
            child("child1", "Sarah Johnson", 4, true),
            child("child2", "Michael Chen", 6, true),
            child("child3", "Emma Davis", 3, false),
        ],
        medications: vec![
            Medication {
                id: "med1".to_string(),
                child_id: "child1".to_string(),
                name: "Tylenol".to_string(),
                dosage: "5ml".to_string(),
                scheduled_time: now_ms + 30 * MINUTE_MS,
                frequency: "Every 6 hours".to_string(),
                instructions: "Give with food".to_string(),
                is_critical: true,
                last_administered: None,
            },
            Medication {
                id: "med2".to_string(),
                child_id: "child2".to_string(),
                name: "Vitamin D".to_string(),
                dosage: "1 tablet".to_string(),
                scheduled_time: now_ms + 4 * HOUR_MS,
                frequency: "Daily".to_string(),
                instructions: "Chewable".to_string(),
                is_critical: false,
                last_administered: None,
            },
        ],
        meals: vec![
            Meal {
                id: "meal1".to_string(),
                child_id: "child1".to_string(),
                meal_type: "Lunch".to_string(),
                scheduled_time: now_ms + 2 * HOUR_MS,
                dietary_restrictions: "Vegetarian".to_string(),
                allergies: "Peanuts".to_string(),
                last_served: None,
            },
            Meal {
                id: "meal2".to_string(),
                child_id: "child2".to_string(),
                meal_type: "Snack".to_string(),
                scheduled_time: now_ms + 3 * HOUR_MS,
                dietary_restrictions: String::new(),
                allergies: String::new(),
                last_served: None,
            },
        ],
        health_checks: vec![
            HealthCheck {
                id: "health1".to_string(),
                child_id: "child1".to_string(),
                check_type: "Temperature".to_string(),
                scheduled_time: now_ms + HOUR_MS,
                notes: None,
                last_checked: None,
            },
            HealthCheck {
                id: "health2".to_string(),
                child_id: "child3".to_string(),
                check_type: "Weight".to_string(),
                scheduled_time: now_ms + 5 * HOUR_MS,
                notes: None,
                last_checked: None,
            },
        ],
        tasks: vec![
            CareTask {
                id: "task1".to_string(),
                child_id: "child1".to_string(),
                title: "Give Tylenol".to_string(),
                description: "5ml of Tylenol with food".to_string(),
                scheduled_time: now_ms + 30 * MINUTE_MS,
                kind: TaskKind::Medication,
                status: TaskStatus::Pending,
                priority: Priority::Critical,
                source_id: Some("med1".to_string()),
            },
            CareTask {
                id: "task2".to_string(),
                child_id: "child1".to_string(),
                title: "Serve Lunch".to_string(),
                description: "Vegetarian lunch, no peanuts".to_string(),
                scheduled_time: now_ms + 2 * HOUR_MS,
                kind: TaskKind::Meal,
                status: TaskStatus::Pending,
                priority: Priority::High,
                source_id: Some("meal1".to_string()),
            },
            CareTask {
                id: "task3".to_string(),
                child_id: "child2".to_string(),
                title: "Vitamin D".to_string(),
                description: "1 chewable tablet".to_string(),
                scheduled_time: now_ms + 4 * HOUR_MS,
                kind: TaskKind::Medication,
                status: TaskStatus::Pending,
                priority: Priority::Normal,
                source_id: Some("med2".to_string()),
            },
        ],
    }
}

/// Inserts the sample dataset when every care table is empty.
///
/// The emptiness check and the inserts share one transaction. Returns `None`
/// when the cache already holds rows.
pub fn seed_if_empty(store: &CacheStore, now_ms: i64) -> CacheResult<Option<UpsertOutcome>> {
    let outcome = store.write(&CacheTable::ALL, |tx| {
        for table in CacheTable::ALL {
            if count_rows(tx, table)? > 0 {
                return Ok(None);
            }
        }

        let data = sample_dataset(now_ms);
        let mode = UpsertMode::KeepExisting;
        let outcome = children::upsert_children(tx, &data.children, mode)?
            .merge(medications::upsert_medications(tx, &data.medications, mode)?)
            .merge(meals::upsert_meals(tx, &data.meals, mode)?)
            .merge(health_checks::upsert_health_checks(tx, &data.health_checks, mode)?)
            .merge(tasks::upsert_tasks(tx, &data.tasks, mode)?);
        Ok::<_, CacheError>(Some(outcome))
    })?;

    if let Some(outcome) = outcome {
        info!(
            "event=cache_seed module=sync status=ok rows={}",
            outcome.written
        );
    }
    Ok(outcome)
}
