//! Medication repository.

use super::{RepoError, RepoResult, RepoStream};
use crate::cache::{children, medications, tasks, CacheStore, CacheTable};
use crate::model::medication::Medication;
use log::info;

pub trait MedicationRepository: Send + Sync {
    fn get_medication(&self, id: &str) -> RepoResult<Medication>;
    fn list_medications_for_child(&self, child_id: &str) -> RepoResult<Vec<Medication>>;
    fn observe_medications_for_child(&self, child_id: &str) -> RepoStream<Vec<Medication>>;
    /// Stamps `last_administered` and completes pending tasks sourced from it.
    fn mark_administered(&self, id: &str, now_ms: i64) -> RepoResult<Medication>;
}

pub struct CacheMedicationRepository {
    store: CacheStore,
}

impl CacheMedicationRepository {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }
}

impl MedicationRepository for CacheMedicationRepository {
    fn get_medication(&self, id: &str) -> RepoResult<Medication> {
        self.store
            .medication(id)?
            .ok_or_else(|| RepoError::not_found("medication", id))
    }

    fn list_medications_for_child(&self, child_id: &str) -> RepoResult<Vec<Medication>> {
        Ok(self.store.medications_for_child(child_id)?)
    }

    fn observe_medications_for_child(&self, child_id: &str) -> RepoStream<Vec<Medication>> {
        let store = self.store.clone();
        let child_id = child_id.to_string();
        self.store.live(&[CacheTable::Medications], move || {
            store
                .medications_for_child(&child_id)
                .map_err(RepoError::from)
        })
    }

    fn mark_administered(&self, id: &str, now_ms: i64) -> RepoResult<Medication> {
        let (medication, completed) = self.store.write(
            &[
                CacheTable::Medications,
                CacheTable::Tasks,
                CacheTable::Children,
            ],
            |tx| {
                let medication = medications::get_medication(tx, id)?
                    .ok_or_else(|| RepoError::not_found("medication", id))?;
                medications::set_last_administered(tx, id, now_ms)?;
                let completed = tasks::complete_pending_for_source(tx, id)?;
                children::refresh_pending_flag(tx, &medication.child_id)?;
                Ok::<_, RepoError>((
                    Medication {
                        last_administered: Some(now_ms),
                        ..medication
                    },
                    completed.len(),
                ))
            },
        )?;

        info!(
            "event=medication_administered module=repo status=ok medication_id={} completed_tasks={completed}",
            medication.id
        );
        Ok(medication)
    }
}
