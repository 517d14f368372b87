// Persistence contract for user and project records.
// Records are JSON objects keyed by their "id" field. The browser backs this with
// IndexedDB on the JS side; MemoryStore serves tests and native callers.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

use crate::types::{Project, ProjectId, UserId};

/// A boxed future returning a store `Result`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a>>;

/// Storage error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record in '{collection}' has no string \"id\" field")]
    MissingKey { collection: &'static str },

    #[error("collection '{collection}' has no index '{index}'")]
    UnknownIndex {
        collection: &'static str,
        index: String,
    },

    #[error("record serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Object stores known to the studio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Projects,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
        }
    }

    /// Field every record is keyed by.
    pub fn key_path(&self) -> &'static str {
        "id"
    }

    /// Secondary indexes, each named after the field it covers.
    pub fn indexes(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &[],
            Collection::Projects => &["owner_id"],
        }
    }

    fn check_index(&self, index: &str) -> Result<(), StoreError> {
        if self.indexes().contains(&index) {
            Ok(())
        } else {
            Err(StoreError::UnknownIndex {
                collection: self.name(),
                index: index.to_string(),
            })
        }
    }

    fn key_of(&self, record: &Value) -> Result<String, StoreError> {
        record
            .get(self.key_path())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StoreError::MissingKey {
                collection: self.name(),
            })
    }
}

/// Key-value record storage with secondary indexes.
///
/// No transactions span multiple records. Deleting an absent key succeeds.
pub trait Store {
    fn get<'a>(&'a self, collection: Collection, key: &'a str) -> StoreFuture<'a, Option<Value>>;

    fn get_by_index<'a>(
        &'a self,
        collection: Collection,
        index: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, Vec<Value>>;

    /// Insert or replace a record; returns the stored record.
    fn put(&self, collection: Collection, record: Value) -> StoreFuture<'_, Value>;

    fn delete<'a>(&'a self, collection: Collection, key: &'a str) -> StoreFuture<'a, ()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.records
            .borrow()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }
}

impl Store for MemoryStore {
    fn get<'a>(&'a self, collection: Collection, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        let found = self
            .records
            .borrow()
            .get(&collection)
            .and_then(|records| records.get(key))
            .cloned();
        Box::pin(async move { Ok(found) })
    }

    fn get_by_index<'a>(
        &'a self,
        collection: Collection,
        index: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, Vec<Value>> {
        let result: Result<Vec<Value>, StoreError> = collection.check_index(index).map(|()| {
            self.records
                .borrow()
                .get(&collection)
                .map(|records| {
                    records
                        .values()
                        .filter(|r| r.get(index).and_then(Value::as_str) == Some(value))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });
        Box::pin(async move { result })
    }

    fn put(&self, collection: Collection, record: Value) -> StoreFuture<'_, Value> {
        let result = collection.key_of(&record).map(|key| {
            self.records
                .borrow_mut()
                .entry(collection)
                .or_default()
                .insert(key, record.clone());
            record
        });
        Box::pin(async move { result })
    }

    fn delete<'a>(&'a self, collection: Collection, key: &'a str) -> StoreFuture<'a, ()> {
        if let Some(records) = self.records.borrow_mut().get_mut(&collection) {
            records.remove(key);
        }
        Box::pin(async { Ok(()) })
    }
}

/// Typed project access over any [`Store`].
pub struct ProjectRepository<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> ProjectRepository<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ProjectRepository { store }
    }

    pub async fn save(&self, project: &Project) -> Result<Project, StoreError> {
        let record = serde_json::to_value(project)?;
        let stored = self.store.put(Collection::Projects, record).await?;
        log::debug!("Saved project {}", project.id.as_str());
        Ok(serde_json::from_value(stored)?)
    }

    pub async fn load(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        match self.store.get(Collection::Projects, id.as_str()).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    /// All projects owned by `owner`, most recently updated first.
    pub async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<Project>, StoreError> {
        let records = self
            .store
            .get_by_index(Collection::Projects, "owner_id", owner.as_str())
            .await?;
        let mut projects = records
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Project>, _>>()?;
        projects.sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
        Ok(projects)
    }

    pub async fn delete(&self, id: &ProjectId) -> Result<(), StoreError> {
        self.store.delete(Collection::Projects, id.as_str()).await?;
        log::debug!("Deleted project {}", id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::types::ProjectState;

    fn project(id: &str, owner: &str, updated_at_ms: u64) -> Project {
        Project {
            id: ProjectId::new(id),
            owner_id: UserId::new(owner),
            name: format!("Project {id}"),
            created_at_ms: 1,
            updated_at_ms,
            state: ProjectState::default(),
        }
    }

    #[test]
    fn put_then_get() {
        let store = MemoryStore::new();
        let record = json!({"id": "u1", "created_at_ms": 5});
        block_on(store.put(Collection::Users, record.clone())).unwrap();

        let found = block_on(store.get(Collection::Users, "u1")).unwrap();
        assert_eq!(found, Some(record));
        assert_eq!(block_on(store.get(Collection::Users, "nope")).unwrap(), None);
        assert_eq!(
            block_on(store.get(Collection::Projects, "u1")).unwrap(),
            None
        );
    }

    #[test]
    fn put_requires_string_id() {
        let store = MemoryStore::new();
        let err = block_on(store.put(Collection::Users, json!({"id": 7}))).unwrap_err();
        assert_eq!(err, StoreError::MissingKey { collection: "users" });
        assert_eq!(store.count(Collection::Users), 0);
    }

    #[test]
    fn put_replaces_existing_record() {
        let store = MemoryStore::new();
        block_on(store.put(Collection::Users, json!({"id": "u1", "v": 1}))).unwrap();
        block_on(store.put(Collection::Users, json!({"id": "u1", "v": 2}))).unwrap();
        assert_eq!(store.count(Collection::Users), 1);
        let found = block_on(store.get(Collection::Users, "u1")).unwrap().unwrap();
        assert_eq!(found["v"], 2);
    }

    #[test]
    fn index_lookup_filters_by_field() {
        let store = MemoryStore::new();
        for (id, owner) in [("p1", "a"), ("p2", "b"), ("p3", "a")] {
            block_on(store.put(Collection::Projects, json!({"id": id, "owner_id": owner}))).unwrap();
        }
        let found = block_on(store.get_by_index(Collection::Projects, "owner_id", "a")).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn unknown_index_is_rejected() {
        let store = MemoryStore::new();
        let err = block_on(store.get_by_index(Collection::Users, "owner_id", "a")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownIndex { .. }));
    }

    #[test]
    fn deleting_missing_key_succeeds() {
        let store = MemoryStore::new();
        assert!(block_on(store.delete(Collection::Projects, "ghost")).is_ok());
    }

    #[test]
    fn repository_round_trip_and_listing_order() {
        let store = MemoryStore::new();
        let repo = ProjectRepository::new(&store);
        block_on(repo.save(&project("old", "owner", 10))).unwrap();
        block_on(repo.save(&project("new", "owner", 30))).unwrap();
        block_on(repo.save(&project("other", "someone-else", 20))).unwrap();

        let listed = block_on(repo.list_for_owner(&UserId::new("owner"))).unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let loaded = block_on(repo.load(&ProjectId::new("old"))).unwrap();
        assert_eq!(loaded, Some(project("old", "owner", 10)));

        block_on(repo.delete(&ProjectId::new("old"))).unwrap();
        assert_eq!(block_on(repo.load(&ProjectId::new("old"))).unwrap(), None);
    }
}
