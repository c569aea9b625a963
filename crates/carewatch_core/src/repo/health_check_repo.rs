//! Health check repository.

use super::{RepoError, RepoResult, RepoStream};
use crate::cache::{children, health_checks, tasks, CacheStore, CacheTable};
use crate::model::health_check::HealthCheck;
use log::info;

pub trait HealthCheckRepository: Send + Sync {
    fn get_health_check(&self, id: &str) -> RepoResult<HealthCheck>;
    fn list_health_checks_for_child(&self, child_id: &str) -> RepoResult<Vec<HealthCheck>>;
    fn observe_health_checks_for_child(&self, child_id: &str) -> RepoStream<Vec<HealthCheck>>;
    /// Stamps `last_checked`, replaces notes when given, and completes pending
    /// tasks sourced from the check.
    fn record_check(
        &self,
        id: &str,
        notes: Option<String>,
        now_ms: i64,
    ) -> RepoResult<HealthCheck>;
}

pub struct CacheHealthCheckRepository {
    store: CacheStore,
}

impl CacheHealthCheckRepository {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }
}

impl HealthCheckRepository for CacheHealthCheckRepository {
    fn get_health_check(&self, id: &str) -> RepoResult<HealthCheck> {
        self.store
            .health_check(id)?
            .ok_or_else(|| RepoError::not_found("health_check", id))
    }

    fn list_health_checks_for_child(&self, child_id: &str) -> RepoResult<Vec<HealthCheck>> {
        Ok(self.store.health_checks_for_child(child_id)?)
    }

    fn observe_health_checks_for_child(&self, child_id: &str) -> RepoStream<Vec<HealthCheck>> {
        let store = self.store.clone();
        let child_id = child_id.to_string();
        self.store.live(&[CacheTable::HealthChecks], move || {
            store
                .health_checks_for_child(&child_id)
                .map_err(RepoError::from)
        })
    }

    fn record_check(
        &self,
        id: &str,
        notes: Option<String>,
        now_ms: i64,
    ) -> RepoResult<HealthCheck> {
        let notes = notes
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let check = self.store.write(
            &[
                CacheTable::HealthChecks,
                CacheTable::Tasks,
                CacheTable::Children,
            ],
            |tx| {
                let check = health_checks::get_health_check(tx, id)?
                    .ok_or_else(|| RepoError::not_found("health_check", id))?;
                health_checks::record_check(tx, id, notes.as_deref(), now_ms)?;
                tasks::complete_pending_for_source(tx, id)?;
                children::refresh_pending_flag(tx, &check.child_id)?;
                Ok::<_, RepoError>(HealthCheck {
                    notes: notes.clone().or(check.notes.clone()),
                    last_checked: Some(now_ms),
                    ..check
                })
            },
        )?;

        info!(
            "event=health_check_recorded module=repo status=ok health_check_id={}",
            check.id
        );
        Ok(check)
    }
}
