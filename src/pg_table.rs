//! PostgreSQL + pgvector [`TenantTable`] implementation.
//!
//! One [`PgTable`] wraps one tenant's table on a shared [`PgPool`]. The
//! handle carries a readiness flag set by [`TenantTable::provision`]; every
//! other operation fails with [`StoreError::NotInitialized`] until then.
//!
//! # Concurrency
//!
//! A per-table `tokio::sync::Mutex` is held for the whole of every
//! transaction, so operations on one tenant never interleave; different
//! tenants run independently. Provisioning checks the readiness flag once
//! without the lock and again under it.
//!
//! # Failure Handling
//!
//! Each operation runs in its own transaction. On any driver error the
//! transaction is dropped uncommitted (which rolls it back), the failure is
//! logged with tenant and table, and the error is returned with context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tokio::sync::Mutex;

use vectorlab_core::error::{check_dims, check_limit};
use vectorlab_core::fusion;
use vectorlab_core::models::{
    DocumentRow, HybridHit, HybridQuery, NewDocument, TextMatch, VectorMatch,
};
use vectorlab_core::table::TenantTable;
use vectorlab_core::{StoreError, TableName};

use crate::config::Config;
use crate::registry::TableFactory;
use crate::sql;

/// A tenant document table in PostgreSQL.
pub struct PgTable {
    pool: PgPool,
    table: TableName,
    tenant_id: i64,
    embed_dim: usize,
    lists: u32,
    create_extension: bool,
    ready: AtomicBool,
    lock: Mutex<()>,
}

impl PgTable {
    pub fn new(pool: PgPool, table: TableName, tenant_id: i64, embed_dim: usize) -> Self {
        Self {
            pool,
            table,
            tenant_id,
            embed_dim,
            lists: 100,
            create_extension: true,
            ready: AtomicBool::new(false),
            lock: Mutex::new(()),
        }
    }

    /// Set the ivfflat `lists` parameter used at index creation.
    pub fn with_lists(mut self, lists: u32) -> Self {
        self.lists = lists;
        self
    }

    /// Whether provisioning runs `CREATE EXTENSION IF NOT EXISTS vector`.
    pub fn with_create_extension(mut self, create: bool) -> Self {
        self.create_extension = create;
        self
    }

    fn require_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized(self.table.to_string()))
        }
    }

    fn storage_error(&self, err: sqlx::Error, what: &str) -> anyhow::Error {
        tracing::error!(
            tenant = self.tenant_id,
            table = %self.table,
            error = %err,
            "{}",
            what
        );
        anyhow::Error::new(err).context(format!("{} for tenant {}", what, self.tenant_id))
    }
}

fn row_to_document(row: &PgRow) -> Result<DocumentRow, sqlx::Error> {
    Ok(DocumentRow {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        content: row.try_get("content")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_hit(row: &PgRow) -> Result<HybridHit, sqlx::Error> {
    Ok(HybridHit {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        vector_score: row.try_get("vector_score")?,
        vector_distance: row.try_get("vector_distance")?,
        text_score: row.try_get("text_score")?,
        hybrid_score: row.try_get("hybrid_score")?,
    })
}

#[async_trait]
impl TenantTable for PgTable {
    fn table_name(&self) -> &TableName {
        &self.table
    }

    fn tenant_id(&self) -> i64 {
        self.tenant_id
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn provision(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        let result = async {
            let mut tx = self.pool.begin().await?;
            if self.create_extension {
                sqlx::query(sql::create_extension())
                    .execute(&mut *tx)
                    .await?;
            }
            sqlx::query(&sql::create_table(&self.table, self.embed_dim))
                .execute(&mut *tx)
                .await?;
            for stmt in sql::create_indexes(&self.table, self.lists) {
                sqlx::query(&stmt).execute(&mut *tx).await?;
            }
            let declared: Option<String> = sqlx::query_scalar(sql::embedding_column_type())
                .bind(self.table.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(declared)
        }
        .await;

        let declared =
            result.map_err(|e| self.storage_error(e, "failed to initialise vector table"))?;

        // An existing table keeps the width it was created with.
        if let Some(width) = declared.as_deref().and_then(sql::parse_vector_width) {
            if width != self.embed_dim {
                tracing::error!(
                    tenant = self.tenant_id,
                    table = %self.table,
                    declared = width,
                    configured = self.embed_dim,
                    "existing table has a different embedding width"
                );
                return Err(StoreError::DimensionMismatch {
                    expected: self.embed_dim,
                    got: width,
                }
                .into());
            }
        }

        self.ready.store(true, Ordering::Release);
        tracing::info!(
            tenant = self.tenant_id,
            table = %self.table,
            dims = self.embed_dim,
            "pgvector table initialised"
        );
        Ok(())
    }

    async fn insert_document(&self, doc: &NewDocument) -> Result<DocumentRow> {
        self.require_ready()?;
        check_dims(self.embed_dim, doc.embedding.len())?;

        let stmt = sql::insert_document(&self.table);
        let embedding = Vector::from(doc.embedding.clone());
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query(&stmt)
                .bind(self.tenant_id)
                .bind(&doc.content)
                .bind(&doc.title)
                .bind(&doc.url)
                .bind(&doc.published_at)
                .bind(embedding)
                .fetch_one(&mut *tx)
                .await?;
            let stored = row_to_document(&row)?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(stored)
        }
        .await;

        result.map_err(|e| self.storage_error(e, "failed to insert document"))
    }

    async fn fetch_document(&self, id: i64) -> Result<Option<DocumentRow>> {
        self.require_ready()?;

        let stmt = sql::fetch_document(&self.table);
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query(&stmt)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            let doc = row.as_ref().map(row_to_document).transpose()?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(doc)
        }
        .await;

        result.map_err(|e| self.storage_error(e, &format!("failed to fetch document {id}")))
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        self.require_ready()?;

        let stmt = sql::delete_document(&self.table);
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            let deleted: Option<i64> = sqlx::query_scalar(&stmt)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(deleted.is_some())
        }
        .await;

        result.map_err(|e| self.storage_error(e, &format!("failed to delete document {id}")))
    }

    async fn count_documents(&self) -> Result<i64> {
        self.require_ready()?;

        let stmt = sql::count_documents(&self.table);
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            let count: i64 = sqlx::query_scalar(&stmt).fetch_one(&mut *tx).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(count)
        }
        .await;

        result.map_err(|e| self.storage_error(e, "failed to count documents"))
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<HybridHit>> {
        self.require_ready()?;
        query.validate()?;
        check_dims(self.embed_dim, query.embedding.len())?;

        let text = query.text();
        let stmt = sql::hybrid_search(&self.table, text.is_some());
        let probes = fusion::probes_for(query.vector_k);
        let embedding = Vector::from(query.embedding.clone());

        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(sql::set_probes())
                .bind(probes.to_string())
                .execute(&mut *tx)
                .await?;

            let mut q = sqlx::query(&stmt)
                .bind(embedding)
                .bind(query.vector_k)
                .bind(query.weight_vector)
                .bind(query.weight_text)
                .bind(query.top_k);
            if let Some(fts) = text {
                q = q
                    .bind(fts)
                    .bind(fusion::text_k(query.vector_k, query.top_k));
            }
            let rows = q.fetch_all(&mut *tx).await?;
            let hits = rows.iter().map(row_to_hit).collect::<Result<Vec<_>, _>>()?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(hits)
        }
        .await;

        let hits = result.map_err(|e| self.storage_error(e, "hybrid search failed"))?;
        tracing::debug!(
            tenant = self.tenant_id,
            probes,
            lexical = text.is_some(),
            hits = hits.len(),
            "hybrid search complete"
        );
        Ok(hits)
    }

    async fn debug_vector_matches(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorMatch>> {
        self.require_ready()?;
        check_limit("k", k)?;
        check_dims(self.embed_dim, embedding.len())?;

        let stmt = sql::debug_vector_matches(&self.table);
        let vector = Vector::from(embedding.to_vec());
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(sql::set_probes())
                .bind(fusion::probes_for(k).to_string())
                .execute(&mut *tx)
                .await?;
            let rows = sqlx::query(&stmt)
                .bind(vector)
                .bind(k)
                .fetch_all(&mut *tx)
                .await?;
            let matches = rows
                .iter()
                .map(|row| -> Result<VectorMatch, sqlx::Error> {
                    Ok(VectorMatch {
                        id: row.try_get("id")?,
                        title: row.try_get("title")?,
                        vector_distance: row.try_get("vector_distance")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(matches)
        }
        .await;

        result.map_err(|e| self.storage_error(e, "vector debug query failed"))
    }

    async fn debug_text_matches(&self, fts_query: &str, limit: i64) -> Result<Vec<TextMatch>> {
        self.require_ready()?;
        check_limit("limit", limit)?;
        if fts_query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stmt = sql::debug_text_matches(&self.table);
        let _guard = self.lock.lock().await;
        let result = async {
            let mut tx = self.pool.begin().await?;
            let rows = sqlx::query(&stmt)
                .bind(fts_query)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await?;
            let matches = rows
                .iter()
                .map(|row| -> Result<TextMatch, sqlx::Error> {
                    Ok(TextMatch {
                        id: row.try_get("id")?,
                        title: row.try_get("title")?,
                        text_score: row.try_get("text_score")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(matches)
        }
        .await;

        result.map_err(|e| self.storage_error(e, "text debug query failed"))
    }
}

/// Builds [`PgTable`] handles on a shared pool for the registry.
pub struct PgTableFactory {
    pool: PgPool,
    lists: u32,
    create_extension: bool,
}

impl PgTableFactory {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            lists: config.index.ivfflat_lists,
            create_extension: config.db.create_extension,
        }
    }
}

#[async_trait]
impl TableFactory for PgTableFactory {
    async fn open_table(
        &self,
        table: TableName,
        tenant_id: i64,
        embed_dim: usize,
    ) -> Result<Arc<dyn TenantTable>> {
        let handle = PgTable::new(self.pool.clone(), table, tenant_id, embed_dim)
            .with_lists(self.lists)
            .with_create_extension(self.create_extension);
        Ok(Arc::new(handle))
    }
}
