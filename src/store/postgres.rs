use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use super::DocumentStore;
use crate::error::{AppError, AppResult};

const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT        NOT NULL,
    id          UUID        NOT NULL,
    body        JSONB       NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)
"#;

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed document store: one JSONB row per document.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        info!("Connecting to Postgres document store");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::query(CREATE_DOCUMENTS_TABLE).execute(&pool).await?;
        info!("Postgres document store ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get(&self, collection: &str, id: Uuid) -> AppResult<Option<Value>> {
        let body = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(body.map(|Json(value)| value))
    }

    async fn scan(&self, collection: &str) -> AppResult<Vec<Value>> {
        let bodies = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT body FROM documents WHERE collection = $1 ORDER BY inserted_at",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(bodies.into_iter().map(|Json(value)| value).collect())
    }

    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<()> {
        let result = sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AppError::validation(format!(
                    "Document {} already exists in {}",
                    id, collection
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<Value> {
        let Json(stored) = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET body = CASE
                WHEN jsonb_exists(documents.body, 'created_at')
                    THEN EXCLUDED.body || jsonb_build_object('created_at', documents.body -> 'created_at')
                ELSE EXCLUDED.body
            END
            RETURNING body
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(doc))
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> AppResult<bool> {
        let result = sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
