// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! PostgreSQL document store.
//!
//! All collections share one `documents` table holding JSONB bodies; filters
//! become containment queries (`body @> $filter`). The schema lives in
//! `migrations/`, including the partial unique index that enforces one
//! `platform` document per (`url`, `clientId`).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use tracing::info;

use super::{Collection, DocumentStore, Filter, StoreError};

/// PostgreSQL-backed document store
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(collection: Collection, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            collection,
            detail: db.message().to_string(),
        },
        _ => StoreError::Database(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let rows: Vec<Json<Value>> = sqlx::query_scalar(
            "SELECT body FROM documents
             WHERE collection = $1 AND body @> $2
             ORDER BY id",
        )
        .bind(collection.as_str())
        .bind(Json(filter.to_value()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(collection, e))?;

        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn replace(
        &self,
        collection: Collection,
        filter: &Filter,
        record: Value,
        upsert: bool,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET body = $3
             WHERE id = (
                 SELECT id FROM documents
                 WHERE collection = $1 AND body @> $2
                 ORDER BY id LIMIT 1
             )",
        )
        .bind(collection.as_str())
        .bind(Json(filter.to_value()))
        .bind(Json(&record))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(collection, e))?;

        if result.rows_affected() > 0 || !upsert {
            return Ok(result.rows_affected());
        }

        let inserted = sqlx::query("INSERT INTO documents (collection, body) VALUES ($1, $2)")
            .bind(collection.as_str())
            .bind(Json(&record))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(collection, e))?;
        Ok(inserted.rows_affected())
    }

    async fn modify(&self, collection: Collection, filter: &Filter, patch: Value) -> Result<u64, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::Serialization("patch must be a JSON object".into()));
        }

        let result = sqlx::query(
            "UPDATE documents SET body = body || $3
             WHERE collection = $1 AND body @> $2",
        )
        .bind(collection.as_str())
        .bind(Json(filter.to_value()))
        .bind(Json(&patch))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(collection, e))?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND body @> $2")
            .bind(collection.as_str())
            .bind(Json(filter.to_value()))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(collection, e))?;

        Ok(result.rows_affected())
    }
}
