//! Postgres-backed storage
use super::{AttachmentRepository, ContentSearch, MetadataStore, StorageError, TaxonomyStore};
use crate::models::AttachmentId;
use crate::services::search::ContentQuery;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Postgres implementation of the host storage seams
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl MetadataStore for PgStore {
    async fn get(&self, id: AttachmentId, key: &str) -> Result<Option<Value>, StorageError> {
        let value: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT meta_value
            FROM post_meta
            WHERE post_id = $1 AND meta_key = $2
            "#,
        )
        .bind(id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, id: AttachmentId, key: &str, value: Value) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO post_meta (post_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, meta_key) DO UPDATE SET
                meta_value = EXCLUDED.meta_value,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: AttachmentId, key: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM post_meta
            WHERE post_id = $1 AND meta_key = $2
            "#,
        )
        .bind(id)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaxonomyStore for PgStore {
    async fn attach_terms(
        &self,
        id: AttachmentId,
        taxonomy: &str,
        names: &[String],
        append: bool,
    ) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await?;

        if !append {
            sqlx::query(
                r#"
                DELETE FROM post_terms pt
                USING taxonomy_terms t
                WHERE pt.term_id = t.id
                  AND pt.post_id = $1
                  AND t.taxonomy = $2
                "#,
            )
            .bind(id)
            .bind(taxonomy)
            .execute(&mut *tx)
            .await?;
        }

        let mut attached = 0;
        for name in names.iter().filter(|n| !n.is_empty()) {
            let term_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO taxonomy_terms (taxonomy, name)
                VALUES ($1, $2)
                ON CONFLICT (taxonomy, name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(taxonomy)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            let result = sqlx::query(
                r#"
                INSERT INTO post_terms (post_id, term_id)
                VALUES ($1, $2)
                ON CONFLICT (post_id, term_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(term_id)
            .execute(&mut *tx)
            .await?;

            attached += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(attached)
    }

    async fn terms_for(
        &self,
        id: AttachmentId,
        taxonomy: &str,
    ) -> Result<Vec<String>, StorageError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM post_terms pt
            JOIN taxonomy_terms t ON t.id = pt.term_id
            WHERE pt.post_id = $1 AND t.taxonomy = $2
            ORDER BY pt.created_at, t.name
            "#,
        )
        .bind(id)
        .bind(taxonomy)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }
}

#[async_trait]
impl AttachmentRepository for PgStore {
    async fn attached_file(&self, id: AttachmentId) -> Result<Option<String>, StorageError> {
        let file: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT attached_file
            FROM posts
            WHERE id = $1
              AND post_type = 'attachment'
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file.flatten())
    }

    async fn attachments_missing_meta(
        &self,
        meta_key: &str,
        after: Option<AttachmentId>,
        limit: i64,
    ) -> Result<Vec<AttachmentId>, StorageError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM posts p
            WHERE p.post_type = 'attachment'
              AND p.deleted_at IS NULL
              AND p.attached_file IS NOT NULL
              AND ($2::uuid IS NULL OR p.id > $2)
              AND NOT EXISTS (
                SELECT 1 FROM post_meta m
                WHERE m.post_id = p.id AND m.meta_key = $1
              )
            ORDER BY p.id
            LIMIT $3
            "#,
        )
        .bind(meta_key)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl ContentSearch for PgStore {
    async fn search_content(&self, mut query: ContentQuery) -> Result<Vec<Uuid>, StorageError> {
        let mut builder = query.build();
        debug!(sql = %builder.sql(), "Running content query");

        let ids: Vec<Uuid> = builder
            .build_query_scalar::<Uuid>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}
