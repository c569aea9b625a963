//! Child repository.

use super::{RepoError, RepoResult, RepoStream};
use crate::cache::{children, CacheStore, CacheTable};
use crate::model::child::Child;

pub trait ChildRepository: Send + Sync {
    fn get_child(&self, id: &str) -> RepoResult<Child>;
    fn list_children(&self) -> RepoResult<Vec<Child>>;
    fn observe_children(&self) -> RepoStream<Vec<Child>>;
}

/// Cache-backed child repository.
pub struct CacheChildRepository {
    store: CacheStore,
}

impl CacheChildRepository {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }
}

impl ChildRepository for CacheChildRepository {
    fn get_child(&self, id: &str) -> RepoResult<Child> {
        self.store
            .read(|conn| children::get_child(conn, id).map_err(RepoError::from))?
            .ok_or_else(|| RepoError::not_found("child", id))
    }

    fn list_children(&self) -> RepoResult<Vec<Child>> {
        Ok(self.store.children()?)
    }

    fn observe_children(&self) -> RepoStream<Vec<Child>> {
        let store = self.store.clone();
        self.store.live(&[CacheTable::Children], move || {
            store.children().map_err(RepoError::from)
        })
    }
}
