//! Meal repository.

use super::{RepoError, RepoResult, RepoStream};
use crate::cache::{children, meals, tasks, CacheStore, CacheTable};
use crate::model::meal::Meal;
use log::info;

pub trait MealRepository: Send + Sync {
    fn get_meal(&self, id: &str) -> RepoResult<Meal>;
    fn list_meals_for_child(&self, child_id: &str) -> RepoResult<Vec<Meal>>;
    fn observe_meals_for_child(&self, child_id: &str) -> RepoStream<Vec<Meal>>;
    /// Stamps `last_served` and completes pending tasks sourced from it.
    fn mark_served(&self, id: &str, now_ms: i64) -> RepoResult<Meal>;
}

pub struct CacheMealRepository {
    store: CacheStore,
}

impl CacheMealRepository {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }
}

impl MealRepository for CacheMealRepository {
    fn get_meal(&self, id: &str) -> RepoResult<Meal> {
        self.store
            .meal(id)?
            .ok_or_else(|| RepoError::not_found("meal", id))
    }

    fn list_meals_for_child(&self, child_id: &str) -> RepoResult<Vec<Meal>> {
        Ok(self.store.meals_for_child(child_id)?)
    }

    fn observe_meals_for_child(&self, child_id: &str) -> RepoStream<Vec<Meal>> {
        let store = self.store.clone();
        let child_id = child_id.to_string();
        self.store.live(&[CacheTable::Meals], move || {
            store.meals_for_child(&child_id).map_err(RepoError::from)
        })
    }

    fn mark_served(&self, id: &str, now_ms: i64) -> RepoResult<Meal> {
        let meal = self.store.write(
            &[CacheTable::Meals, CacheTable::Tasks, CacheTable::Children],
            |tx| {
                let meal =
                    meals::get_meal(tx, id)?.ok_or_else(|| RepoError::not_found("meal", id))?;
                meals::set_last_served(tx, id, now_ms)?;
                tasks::complete_pending_for_source(tx, id)?;
                children::refresh_pending_flag(tx, &meal.child_id)?;
                Ok::<_, RepoError>(Meal {
                    last_served: Some(now_ms),
                    ..meal
                })
            },
        )?;

        info!("event=meal_served module=repo status=ok meal_id={}", meal.id);
        Ok(meal)
    }
}
