use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::algorithms::keywords::{extract_keywords, MAX_KEYWORDS};
use crate::algorithms::ItemBasedCollaborativeFiltering;
use crate::config::{SimilarityBackend, SimilarityConfig};
use crate::error::{AppError, AppResult};
use crate::models::*;

pub const UNCATEGORIZED: &str = "uncategorized";

#[async_trait]
pub trait SimilarityEngine: Send + Sync {
    async fn build_user_item_matrix(
        &self,
        category: &str,
        rows: &CategoryRows,
    ) -> AppResult<CategoryMatrix>;

    async fn build_item_similarity(
        &self,
        category: &str,
        matrix: &CategoryMatrix,
    ) -> AppResult<CategorySimilarity>;

    async fn recommend(
        &self,
        user_id: Uuid,
        matrix: &CategoryMatrix,
        similarity: &CategorySimilarity,
    ) -> AppResult<Vec<Uuid>>;

    async fn classify(&self, title: &str, abstract_text: &str) -> AppResult<Classification>;
}

pub fn create_engine(config: &SimilarityConfig) -> AppResult<Arc<dyn SimilarityEngine>> {
    match config.backend {
        SimilarityBackend::Remote => {
            info!("Using similarity service at {}", config.base_url);
            Ok(Arc::new(RemoteSimilarityClient::new(config)?))
        }
        SimilarityBackend::Local => {
            info!("Using in-process similarity engine (top {})", config.top_n);
            Ok(Arc::new(LocalSimilarityEngine::new(config.top_n)))
        }
    }
}

#[derive(Serialize)]
struct MatrixRequest<'a> {
    data: &'a CategoryRows,
    category: &'a str,
}

#[derive(Deserialize)]
struct MatrixResponse {
    user_item_matrix: CategoryMatrix,
}

#[derive(Serialize)]
struct SimilarityRequest<'a> {
    user_item_matrix: &'a CategoryMatrix,
}

#[derive(Deserialize)]
struct SimilarityResponse {
    item_similarity_df: CategorySimilarity,
}

#[derive(Serialize)]
struct RecommendRequest<'a> {
    user_item_matrix: &'a CategoryMatrix,
    item_similarity_df: &'a CategorySimilarity,
    user_id: String,
}

#[derive(Deserialize)]
struct RecommendResponse {
    recommended_items: Vec<String>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
}

pub struct RemoteSimilarityClient {
    client: Client,
    base_url: String,
}

impl RemoteSimilarityClient {
    pub fn new(config: &SimilarityConfig) -> AppResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> AppResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::server(format!(
                "Similarity service {} returned {}: {}",
                path, status, text
            )));
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl SimilarityEngine for RemoteSimilarityClient {
    async fn build_user_item_matrix(
        &self,
        category: &str,
        rows: &CategoryRows,
    ) -> AppResult<CategoryMatrix> {
        let response: MatrixResponse = self
            .post(
                "/get-user-item-matrix",
                &MatrixRequest {
                    data: rows,
                    category,
                },
            )
            .await?;
        Ok(response.user_item_matrix)
    }

    async fn build_item_similarity(
        &self,
        _category: &str,
        matrix: &CategoryMatrix,
    ) -> AppResult<CategorySimilarity> {
        let response: SimilarityResponse = self
            .post(
                "/get-item-similarity-df",
                &SimilarityRequest {
                    user_item_matrix: matrix,
                },
            )
            .await?;
        Ok(response.item_similarity_df)
    }

    async fn recommend(
        &self,
        user_id: Uuid,
        matrix: &CategoryMatrix,
        similarity: &CategorySimilarity,
    ) -> AppResult<Vec<Uuid>> {
        let response: RecommendResponse = self
            .post(
                "/recommend-document",
                &RecommendRequest {
                    user_item_matrix: matrix,
                    item_similarity_df: similarity,
                    user_id: user_id.to_string(),
                },
            )
            .await?;

        Ok(parse_item_ids(response.recommended_items))
    }

    async fn classify(&self, title: &str, abstract_text: &str) -> AppResult<Classification> {
        self.post(
            "/classify-and-keywords",
            &ClassifyRequest {
                title,
                abstract_text,
            },
        )
        .await
    }
}

fn parse_item_ids(items: Vec<String>) -> Vec<Uuid> {
    items
        .into_iter()
        .filter_map(|item| match Uuid::parse_str(&item) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring recommended item with malformed id {:?}", item);
                None
            }
        })
        .collect()
}

pub struct LocalSimilarityEngine {
    cf: ItemBasedCollaborativeFiltering,
}

impl LocalSimilarityEngine {
    pub fn new(top_n: usize) -> Self {
        Self {
            cf: ItemBasedCollaborativeFiltering::new(top_n),
        }
    }
}

#[async_trait]
impl SimilarityEngine for LocalSimilarityEngine {
    async fn build_user_item_matrix(
        &self,
        category: &str,
        rows: &CategoryRows,
    ) -> AppResult<CategoryMatrix> {
        Ok(self.cf.pivot(category, rows))
    }

    async fn build_item_similarity(
        &self,
        _category: &str,
        matrix: &CategoryMatrix,
    ) -> AppResult<CategorySimilarity> {
        Ok(self.cf.similarity(matrix))
    }

    async fn recommend(
        &self,
        user_id: Uuid,
        matrix: &CategoryMatrix,
        similarity: &CategorySimilarity,
    ) -> AppResult<Vec<Uuid>> {
        let items = self.cf.recommend(&user_id.to_string(), matrix, similarity);
        Ok(parse_item_ids(items))
    }

    async fn classify(&self, title: &str, abstract_text: &str) -> AppResult<Classification> {
        let text = format!("{} {}", title, abstract_text);
        Ok(Classification {
            category: UNCATEGORIZED.to_string(),
            keywords: extract_keywords(&text, MAX_KEYWORDS),
        })
    }
}
