//! Document persistence.
//!
//! Every entity is stored as a JSON document addressed by `(collection, id)`. Upserts
//! replace the stored body wholesale but keep the original `created_at`, so a natural
//! key mapped onto a stable id gives last-write-wins semantics per key.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::AppResult;
use crate::models::{
    ActivityEvent, Comment, FeedEntry, Group, Project, Recommendation, RecordStatus, Resource, User,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Entities persisted as documents.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn status(&self) -> RecordStatus;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: Uuid) -> AppResult<Option<Value>>;

    async fn scan(&self, collection: &str) -> AppResult<Vec<Value>>;

    /// Fails with a validation error when the id is already taken.
    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<()>;

    /// Atomically inserts or replaces, keeping an existing `created_at`.
    async fn upsert(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<Value>;

    /// Replaces an existing document; returns false when there was nothing to replace.
    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<bool>;
}

/// Typed view over one collection.
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn get_active(&self, id: Uuid) -> AppResult<Option<T>> {
        Ok(self
            .get(id)
            .await?
            .filter(|doc| doc.status() == RecordStatus::Active))
    }

    /// All documents in creation order. Unreadable documents are logged and skipped.
    pub async fn all(&self) -> AppResult<Vec<T>> {
        let mut docs: Vec<T> = self
            .store
            .scan(T::COLLECTION)
            .await?
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<T>(value) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    error!("Error reading {} document: {}", T::COLLECTION, e);
                    None
                }
            })
            .collect();

        docs.sort_by_key(|doc| doc.created_at());
        Ok(docs)
    }

    pub async fn find<F>(&self, predicate: F) -> AppResult<Vec<T>>
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        Ok(self.all().await?.into_iter().filter(|doc| predicate(doc)).collect())
    }

    pub async fn find_active<F>(&self, predicate: F) -> AppResult<Vec<T>>
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        self.find(|doc| doc.status() == RecordStatus::Active && predicate(doc))
            .await
    }

    pub async fn insert(&self, doc: &T) -> AppResult<()> {
        self.store
            .insert(T::COLLECTION, doc.id(), serde_json::to_value(doc)?)
            .await
    }

    pub async fn upsert(&self, doc: &T) -> AppResult<T> {
        let stored = self
            .store
            .upsert(T::COLLECTION, doc.id(), serde_json::to_value(doc)?)
            .await?;
        Ok(serde_json::from_value(stored)?)
    }

    pub async fn replace(&self, doc: &T) -> AppResult<bool> {
        self.store
            .replace(T::COLLECTION, doc.id(), serde_json::to_value(doc)?)
            .await
    }
}

/// Handle to the primary datastore.
#[derive(Clone)]
pub struct Datastore {
    backend: Arc<dyn DocumentStore>,
}

impl Datastore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            DatabaseBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Self::in_memory())
            }
            DatabaseBackend::Postgres => {
                let store = PostgresStore::connect(&config.url, config.max_connections).await?;
                Ok(Self::new(Arc::new(store)))
            }
        }
    }

    pub fn collection<T: Document>(&self) -> Collection<T> {
        Collection::new(self.backend.clone())
    }

    pub fn users(&self) -> Collection<User> {
        self.collection()
    }

    pub fn groups(&self) -> Collection<Group> {
        self.collection()
    }

    pub fn projects(&self) -> Collection<Project> {
        self.collection()
    }

    pub fn resources(&self) -> Collection<Resource> {
        self.collection()
    }

    pub fn activities(&self) -> Collection<ActivityEvent> {
        self.collection()
    }

    pub fn recommendations(&self) -> Collection<Recommendation> {
        self.collection()
    }

    pub fn comments(&self) -> Collection<Comment> {
        self.collection()
    }

    pub fn feeds(&self) -> Collection<FeedEntry> {
        self.collection()
    }
}
