//! Core of the CareWatch companion: local care cache, paired-device sync,
//! repositories, reminders and screen view-models.
//! This crate owns every care-data invariant; UI shells only render its state.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod sync;
pub mod viewmodel;

pub use cache::{CacheCounts, CacheError, CacheStore, CacheTable, LiveQuery, UpsertMode};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::care_task::{CareTask, Priority, TaskKind, TaskStatus};
pub use model::child::Child;
pub use model::health_check::HealthCheck;
pub use model::meal::Meal;
pub use model::medication::Medication;
pub use model::ValidationError;
pub use repo::{CareRepositories, RepoError, RepoResult};
pub use sync::{
    InMemoryPairingChannel, PairingChannel, SyncError, SyncManager, SyncMessage, SyncRole,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
