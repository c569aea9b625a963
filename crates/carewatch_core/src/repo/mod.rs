//! Repository facades over the local cache.
//!
//! # Responsibility
//! - Offer one first-class operation per caretaker action.
//! - Expose live streams that view-models fold into screen state.
//!
//! # Invariants
//! - Every call returns an explicit `RepoResult`; repositories never replace a
//!   failure with fallback content. Fallback is a view-model decision.
//! - Missing rows surface as `RepoError::NotFound`, not as empty results.
//! - Each action is one cache transaction; dependent rows (source timestamps,
//!   child pending flags) change in the same commit.

use crate::cache::{CacheError, CacheStore, LiveQuery};
use crate::model::care_task::TaskStatus;
use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod child_repo;
pub mod health_check_repo;
pub mod meal_repo;
pub mod medication_repo;
pub mod task_repo;

pub use child_repo::{CacheChildRepository, ChildRepository};
pub use health_check_repo::{CacheHealthCheckRepository, HealthCheckRepository};
pub use meal_repo::{CacheMealRepository, MealRepository};
pub use medication_repo::{CacheMedicationRepository, MedicationRepository};
pub use task_repo::{CacheTaskRepository, TaskRepository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Live stream of repository snapshots.
pub type RepoStream<T> = LiveQuery<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Cache(CacheError),
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// The requested status change is not allowed from the current status.
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidTransition { id, from, to } => write!(
                f,
                "task {id} cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidTransition { .. } => None,
        }
    }
}

impl From<CacheError> for RepoError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Cache(CacheError::from(value))
    }
}

/// Repository handles shared by view-models and background workers.
#[derive(Clone)]
pub struct CareRepositories {
    pub children: Arc<dyn ChildRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub medications: Arc<dyn MedicationRepository>,
    pub meals: Arc<dyn MealRepository>,
    pub health_checks: Arc<dyn HealthCheckRepository>,
}

impl CareRepositories {
    /// Builds cache-backed repositories sharing one store.
    pub fn from_store(store: &CacheStore) -> Self {
        Self {
            children: Arc::new(CacheChildRepository::new(store.clone())),
            tasks: Arc::new(CacheTaskRepository::new(store.clone())),
            medications: Arc::new(CacheMedicationRepository::new(store.clone())),
            meals: Arc::new(CacheMealRepository::new(store.clone())),
            health_checks: Arc::new(CacheHealthCheckRepository::new(store.clone())),
        }
    }
}
