use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::aggregator::InteractionAggregator;
use crate::services::matrix_cache::{CacheUpdate, MatrixCacheStore};
use crate::services::similarity::SimilarityEngine;
use crate::store::Datastore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub categories: Vec<String>,
    pub snapshot: Option<Uuid>,
}

#[derive(Clone)]
pub struct RecommendationService {
    store: Datastore,
    aggregator: InteractionAggregator,
    engine: Arc<dyn SimilarityEngine>,
    cache: Arc<dyn MatrixCacheStore>,
}

impl RecommendationService {
    pub fn new(
        store: Datastore,
        aggregator: InteractionAggregator,
        engine: Arc<dyn SimilarityEngine>,
        cache: Arc<dyn MatrixCacheStore>,
    ) -> Self {
        Self {
            store,
            aggregator,
            engine,
            cache,
        }
    }

    /// The first failing category aborts the run and nothing is written, so the
    /// previously cached matrix stays intact. Rerunning is idempotent.
    pub async fn refresh_matrix(&self) -> AppResult<RefreshSummary> {
        let grouped = self.aggregator.aggregate().await?;

        let mut matrices = BTreeMap::new();
        for (category, rows) in &grouped {
            let matrix = self
                .engine
                .build_user_item_matrix(category, rows)
                .await
                .map_err(|e| {
                    error!("Building matrix for category {} failed: {}", category, e);
                    e
                })?;
            matrices.insert(category.clone(), matrix);
        }

        let categories: Vec<String> = matrices.keys().cloned().collect();
        let (update, snapshot) = CacheUpdate::matrix(grouped, matrices);
        self.cache.merge(update).await?;

        info!(
            "Refreshed user-item matrix for {} categories (snapshot {})",
            categories.len(),
            snapshot
        );
        Ok(RefreshSummary {
            categories,
            snapshot: Some(snapshot),
        })
    }

    pub async fn refresh_similarity(&self) -> AppResult<RefreshSummary> {
        let cache = self.cache.read().await?;

        let mut tables = BTreeMap::new();
        for (category, matrix) in &cache.user_item_matrix {
            let table = self
                .engine
                .build_item_similarity(category, matrix)
                .await
                .map_err(|e| {
                    error!("Building similarity for category {} failed: {}", category, e);
                    e
                })?;
            tables.insert(category.clone(), table);
        }

        let categories: Vec<String> = tables.keys().cloned().collect();
        self.cache
            .merge(CacheUpdate::similarity(tables, cache.matrix_snapshot))
            .await?;

        info!(
            "Refreshed item similarity for {} categories",
            categories.len()
        );
        Ok(RefreshSummary {
            categories,
            snapshot: cache.matrix_snapshot,
        })
    }

    /// Matrix stage followed by the similarity stage. A failing similarity stage
    /// leaves the new matrix committed and the cache marked stale until rerun.
    pub async fn refresh_all(&self) -> AppResult<RefreshSummary> {
        self.refresh_matrix().await?;
        self.refresh_similarity().await
    }

    pub async fn recommend_for(&self, user_id: Uuid) -> AppResult<Recommendation> {
        let cache = self.cache.read().await?;

        if !cache.is_consistent() {
            warn!(
                "Similarity snapshot {:?} does not match matrix snapshot {:?}",
                cache.similarity_snapshot, cache.matrix_snapshot
            );
            return Err(AppError::StaleSnapshot(
                "Item similarity is out of date, refresh it before recommending".to_string(),
            ));
        }

        let mut resources = Vec::new();
        for (category, matrix) in &cache.user_item_matrix {
            let similarity = cache.item_similarity_df.get(category).ok_or_else(|| {
                AppError::not_found(format!(
                    "No item similarity computed for category {}",
                    category
                ))
            })?;

            let items = self.engine.recommend(user_id, matrix, similarity).await?;
            resources.extend(items.into_iter().map(|resource_id| RecommendedResource {
                resource_id,
                category: category.clone(),
            }));
        }

        let recommendation = self
            .store
            .recommendations()
            .upsert(&Recommendation::new(user_id, resources))
            .await?;

        info!(
            "Stored {} recommendations for user {}",
            recommendation.resources.len(),
            user_id
        );
        Ok(recommendation)
    }

    pub async fn get_for(&self, user_id: Uuid) -> AppResult<Recommendation> {
        self.store
            .recommendations()
            .get_active(Recommendation::natural_id(user_id))
            .await?
            .ok_or_else(|| AppError::not_found("No recommendation found!"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::ActivityLedger;
    use crate::services::matrix_cache::JsonFileCache;
    use crate::services::similarity::LocalSimilarityEngine;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ledger: ActivityLedger,
        cache: Arc<JsonFileCache>,
        service: RecommendationService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Datastore::in_memory();
        let ledger = ActivityLedger::new(store.clone());
        let cache = Arc::new(JsonFileCache::new(dir.path().join("cache.json")));
        let service = RecommendationService::new(
            store,
            InteractionAggregator::new(ledger.clone()),
            Arc::new(LocalSimilarityEngine::new(3)),
            cache.clone(),
        );
        Fixture {
            _dir: dir,
            ledger,
            cache,
            service,
        }
    }

    async fn record(ledger: &ActivityLedger, user: Uuid, resource: Uuid, duration: f64) {
        ledger
            .record_event(
                user,
                &RecordActivityRequest {
                    resource_id: resource,
                    resource_category: "cs.AI".to_string(),
                    project_id: None,
                    duration,
                    is_favourite: false,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recommend_without_cache_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.service.recommend_for(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recommend_rejects_stale_similarity() {
        let f = fixture();
        record(&f.ledger, Uuid::new_v4(), Uuid::new_v4(), 12.0).await;

        f.service.refresh_all().await.unwrap();
        f.service.refresh_matrix().await.unwrap();

        assert!(matches!(
            f.service.recommend_for(Uuid::new_v4()).await,
            Err(AppError::StaleSnapshot(_))
        ));
    }

    #[tokio::test]
    async fn test_recommend_upserts_single_document() {
        let f = fixture();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        record(&f.ledger, a, x, 12.0).await;
        record(&f.ledger, b, x, 6.0).await;
        record(&f.ledger, b, y, 4.0).await;

        let summary = f.service.refresh_all().await.unwrap();
        assert_eq!(summary.categories, vec!["cs.AI".to_string()]);

        let first = f.service.recommend_for(a).await.unwrap();
        let second = f.service.recommend_for(a).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            second.resources,
            vec![RecommendedResource {
                resource_id: y,
                category: "cs.AI".to_string(),
            }]
        );
        assert_eq!(f.service.get_for(a).await.unwrap().resources, second.resources);

        let stored = f.cache.read().await.unwrap();
        assert!(stored.is_consistent());
        assert!(stored.item_similarity_df.contains_key("cs.AI"));
    }

    #[tokio::test]
    async fn test_get_for_without_recommendation() {
        let f = fixture();
        assert!(f.service.get_for(Uuid::new_v4()).await.is_err());
    }
}
