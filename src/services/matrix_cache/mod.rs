//! The cache holds three sections, each keyed by category: the columnar rows the
//! matrix was built from, the user-item matrix and the item-similarity table. Writes
//! replace whole sections; sections not named in an update are left alone.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::{AppError, AppResult};
use crate::models::{CategoryMatrix, CategoryRows, CategorySimilarity};

const NO_CACHE_MESSAGE: &str = "No matrix has been computed yet";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixCache {
    #[serde(default)]
    pub user_categories_resource_rating: BTreeMap<String, CategoryRows>,
    #[serde(default)]
    pub user_item_matrix: BTreeMap<String, CategoryMatrix>,
    #[serde(default)]
    pub item_similarity_df: BTreeMap<String, CategorySimilarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_snapshot: Option<Uuid>,
    /// The matrix snapshot `item_similarity_df` was built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_snapshot: Option<Uuid>,
}

impl MatrixCache {
    pub fn apply(&mut self, update: CacheUpdate) {
        if let Some(rows) = update.user_categories_resource_rating {
            self.user_categories_resource_rating = rows;
        }
        if let Some(matrix) = update.user_item_matrix {
            self.user_item_matrix = matrix;
        }
        if let Some(similarity) = update.item_similarity_df {
            self.item_similarity_df = similarity;
        }
        if let Some(snapshot) = update.matrix_snapshot {
            self.matrix_snapshot = Some(snapshot);
        }
        if let Some(snapshot) = update.similarity_snapshot {
            self.similarity_snapshot = Some(snapshot);
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.similarity_snapshot == self.matrix_snapshot
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheUpdate {
    pub user_categories_resource_rating: Option<BTreeMap<String, CategoryRows>>,
    pub user_item_matrix: Option<BTreeMap<String, CategoryMatrix>>,
    pub item_similarity_df: Option<BTreeMap<String, CategorySimilarity>>,
    pub matrix_snapshot: Option<Uuid>,
    pub similarity_snapshot: Option<Uuid>,
}

impl CacheUpdate {
    /// A new matrix together with the rows it was built from, under a fresh snapshot id.
    pub fn matrix(
        rows: BTreeMap<String, CategoryRows>,
        matrix: BTreeMap<String, CategoryMatrix>,
    ) -> (Self, Uuid) {
        let snapshot = Uuid::new_v4();
        let update = Self {
            user_categories_resource_rating: Some(rows),
            user_item_matrix: Some(matrix),
            matrix_snapshot: Some(snapshot),
            ..Default::default()
        };
        (update, snapshot)
    }

    pub fn similarity(
        similarity: BTreeMap<String, CategorySimilarity>,
        built_from: Option<Uuid>,
    ) -> Self {
        Self {
            item_similarity_df: Some(similarity),
            similarity_snapshot: built_from,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait MatrixCacheStore: Send + Sync {
    async fn read(&self) -> AppResult<MatrixCache>;

    async fn merge(&self, update: CacheUpdate) -> AppResult<()>;
}

pub async fn open_cache(config: &CacheConfig) -> AppResult<Arc<dyn MatrixCacheStore>> {
    match config.backend {
        CacheBackend::File => {
            info!("Using matrix cache file {}", config.path.display());
            Ok(Arc::new(JsonFileCache::new(&config.path)))
        }
        CacheBackend::Redis => {
            info!("Using redis matrix cache at {}", config.redis_url);
            Ok(Arc::new(RedisMatrixCache::new(
                &config.redis_url,
                &config.key_prefix,
            )?))
        }
    }
}

pub struct JsonFileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> AppResult<Option<MatrixCache>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MatrixCacheStore for JsonFileCache {
    async fn read(&self) -> AppResult<MatrixCache> {
        self.load()
            .await?
            .ok_or_else(|| AppError::not_found(NO_CACHE_MESSAGE))
    }

    async fn merge(&self, update: CacheUpdate) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut cache = self.load().await?.unwrap_or_default();
        cache.apply(update);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&cache)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!("Wrote matrix cache to {}", self.path.display());
        Ok(())
    }
}

const SECTION_ROWS: &str = "user_categories_resource_rating";
const SECTION_MATRIX: &str = "user_item_matrix";
const SECTION_SIMILARITY: &str = "item_similarity_df";
const SECTION_MATRIX_SNAPSHOT: &str = "matrix_snapshot";
const SECTION_SIMILARITY_SNAPSHOT: &str = "similarity_snapshot";

pub struct RedisMatrixCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisMatrixCache {
    pub fn new(url: &str, key_prefix: &str) -> AppResult<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, section: &str) -> String {
        format!("{}:{}", self.key_prefix, section)
    }
}

fn decode_section<T: DeserializeOwned + Default>(raw: Option<&String>) -> AppResult<T> {
    match raw {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(T::default()),
    }
}

#[async_trait]
impl MatrixCacheStore for RedisMatrixCache {
    async fn read(&self) -> AppResult<MatrixCache> {
        let mut conn = self.client.get_async_connection().await?;
        let keys = vec![
            self.key(SECTION_ROWS),
            self.key(SECTION_MATRIX),
            self.key(SECTION_SIMILARITY),
            self.key(SECTION_MATRIX_SNAPSHOT),
            self.key(SECTION_SIMILARITY_SNAPSHOT),
        ];
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        if values.iter().all(Option::is_none) {
            return Err(AppError::not_found(NO_CACHE_MESSAGE));
        }

        Ok(MatrixCache {
            user_categories_resource_rating: decode_section(values[0].as_ref())?,
            user_item_matrix: decode_section(values[1].as_ref())?,
            item_similarity_df: decode_section(values[2].as_ref())?,
            matrix_snapshot: decode_section(values[3].as_ref())?,
            similarity_snapshot: decode_section(values[4].as_ref())?,
        })
    }

    async fn merge(&self, update: CacheUpdate) -> AppResult<()> {
        let mut writes: Vec<(String, String)> = Vec::new();
        if let Some(rows) = &update.user_categories_resource_rating {
            writes.push((self.key(SECTION_ROWS), serde_json::to_string(rows)?));
        }
        if let Some(matrix) = &update.user_item_matrix {
            writes.push((self.key(SECTION_MATRIX), serde_json::to_string(matrix)?));
        }
        if let Some(similarity) = &update.item_similarity_df {
            writes.push((self.key(SECTION_SIMILARITY), serde_json::to_string(similarity)?));
        }
        if let Some(snapshot) = &update.matrix_snapshot {
            writes.push((self.key(SECTION_MATRIX_SNAPSHOT), serde_json::to_string(snapshot)?));
        }
        if let Some(snapshot) = &update.similarity_snapshot {
            writes.push((
                self.key(SECTION_SIMILARITY_SNAPSHOT),
                serde_json::to_string(snapshot)?,
            ));
        }

        if writes.is_empty() {
            return Ok(());
        }

        let mut conn = self.client.get_async_connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in &writes {
            pipe.set(key, value).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        debug!("Merged {} matrix cache sections into redis", writes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rows(category: &str) -> BTreeMap<String, CategoryRows> {
        let mut rows = CategoryRows::default();
        rows.push(Uuid::new_v4(), Uuid::new_v4(), 2.5, category);
        BTreeMap::from([(category.to_string(), rows)])
    }

    #[tokio::test]
    async fn test_read_before_first_write_is_not_found() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nlp_config.json"));
        assert!(matches!(cache.read().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_merge_replaces_sections_wholesale() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested").join("nlp_config.json"));

        let first_rows = rows("cs.AI");
        cache
            .merge(CacheUpdate {
                user_categories_resource_rating: Some(first_rows.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let matrix = BTreeMap::from([("cs.AI".to_string(), CategoryMatrix::default())]);
        cache
            .merge(CacheUpdate {
                user_item_matrix: Some(matrix.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let stored = cache.read().await.unwrap();
        assert_eq!(stored.user_categories_resource_rating, first_rows);
        assert_eq!(stored.user_item_matrix, matrix);

        let replacement = rows("math.CO");
        cache
            .merge(CacheUpdate {
                user_categories_resource_rating: Some(replacement.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let stored = cache.read().await.unwrap();
        assert_eq!(stored.user_categories_resource_rating, replacement);
        assert!(!stored.user_categories_resource_rating.contains_key("cs.AI"));
        assert_eq!(stored.user_item_matrix, matrix);
    }

    #[tokio::test]
    async fn test_snapshots_track_consistency() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache.json"));

        let (update, snapshot) = CacheUpdate::matrix(rows("c"), BTreeMap::new());
        cache.merge(update).await.unwrap();
        assert!(!cache.read().await.unwrap().is_consistent());

        cache
            .merge(CacheUpdate::similarity(BTreeMap::new(), Some(snapshot)))
            .await
            .unwrap();
        assert!(cache.read().await.unwrap().is_consistent());

        let (update, _) = CacheUpdate::matrix(rows("c"), BTreeMap::new());
        cache.merge(update).await.unwrap();
        assert!(!cache.read().await.unwrap().is_consistent());
    }

    #[test]
    fn test_cache_file_layout() {
        let cache = MatrixCache {
            user_categories_resource_rating: rows("cs.AI"),
            ..Default::default()
        };
        let value = serde_json::to_value(&cache).unwrap();
        assert!(value["user_categories_resource_rating"]["cs.AI"]["user_id"].is_array());
        assert!(value["user_item_matrix"].is_object());
        assert!(value["item_similarity_df"].is_object());
        assert!(value.get("matrix_snapshot").is_none());
    }
}
