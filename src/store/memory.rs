use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::DocumentStore;
use crate::error::{AppError, AppResult};

/// Process-local store, one map per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<Uuid, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: Uuid) -> AppResult<Option<Value>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(&id).cloned()))
    }

    async fn scan(&self, collection: &str) -> AppResult<Vec<Value>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<()> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(AppError::validation(format!(
                "Document {} already exists in {}",
                id, collection
            )));
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn upsert(&self, collection: &str, id: Uuid, mut doc: Value) -> AppResult<Value> {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let created_at = docs.get(&id).and_then(|existing| existing.get("created_at").cloned());
        if let (Some(created_at), Some(fields)) = (created_at, doc.as_object_mut()) {
            fields.insert("created_at".to_string(), created_at);
        }
        docs.insert(id, doc.clone());
        Ok(doc)
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<bool> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.get_mut(&id) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
