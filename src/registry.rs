//! Tenant resource registry.
//!
//! The [`TenantRegistry`] caches two kinds of shared handles for the life of
//! the process:
//!
//! - **Tables**: one [`TenantTable`] per tenant id, provisioned on first use.
//! - **Embedders**: one [`EmbeddingService`] per distinct [`EmbeddingKey`],
//!   so tenants configured with the same model share a backend.
//!
//! # Construction
//!
//! Each key maps to a `tokio::sync::OnceCell`. The map lock is a plain
//! `std::sync::Mutex` held only long enough to fetch or insert the cell;
//! building the resource happens inside `OnceCell::get_or_try_init`, outside
//! the lock. Concurrent first callers for one key wait on the same cell and
//! observe the same instance, while different tenants provision in parallel.
//! A failed build leaves the cell empty, so the next call retries.
//!
//! Nothing is ever evicted.
//!
//! # Backends
//!
//! Where handles come from is decided by two factory traits:
//! [`TableFactory`] (PostgreSQL via `PgTableFactory`, or
//! [`MemoryTableFactory`]) and [`EmbedderFactory`]
//! ([`DefaultEmbedderFactory`] builds providers from config).

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

use vectorlab_core::models::{EmbeddingKey, Tenant};
use vectorlab_core::table::memory::MemoryTable;
use vectorlab_core::table::TenantTable;
use vectorlab_core::{StoreError, TableName};

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingService;

/// Opens (but does not provision) a table handle for a tenant.
#[async_trait]
pub trait TableFactory: Send + Sync {
    async fn open_table(
        &self,
        table: TableName,
        tenant_id: i64,
        embed_dim: usize,
    ) -> Result<Arc<dyn TenantTable>>;
}

/// Builds the embedding backend for one [`EmbeddingKey`].
#[async_trait]
pub trait EmbedderFactory: Send + Sync {
    async fn build_embedder(&self, key: EmbeddingKey) -> Result<Arc<EmbeddingService>>;
}

/// [`TableFactory`] producing in-memory tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTableFactory;

#[async_trait]
impl TableFactory for MemoryTableFactory {
    async fn open_table(
        &self,
        table: TableName,
        tenant_id: i64,
        embed_dim: usize,
    ) -> Result<Arc<dyn TenantTable>> {
        Ok(Arc::new(MemoryTable::new(table, tenant_id, embed_dim)))
    }
}

/// [`EmbedderFactory`] that resolves per-key settings from the
/// `[embedding]` defaults and creates the configured provider.
#[derive(Debug, Clone)]
pub struct DefaultEmbedderFactory {
    defaults: EmbeddingConfig,
}

impl DefaultEmbedderFactory {
    pub fn new(defaults: EmbeddingConfig) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl EmbedderFactory for DefaultEmbedderFactory {
    async fn build_embedder(&self, key: EmbeddingKey) -> Result<Arc<EmbeddingService>> {
        let defaults = self.defaults.clone();
        // Local providers load model weights synchronously.
        let service =
            tokio::task::spawn_blocking(move || EmbeddingService::from_defaults(key, &defaults))
                .await??;
        Ok(Arc::new(service))
    }
}

type TableCell = Arc<OnceCell<Arc<dyn TenantTable>>>;
type EmbedderCell = Arc<OnceCell<Arc<EmbeddingService>>>;

#[derive(Default)]
struct Cells {
    tables: HashMap<i64, TableCell>,
    embedders: HashMap<EmbeddingKey, EmbedderCell>,
}

/// Process-wide cache of tenant tables and embedding services.
pub struct TenantRegistry {
    defaults: EmbeddingConfig,
    tables: Arc<dyn TableFactory>,
    embedders: Arc<dyn EmbedderFactory>,
    cells: Mutex<Cells>,
}

impl TenantRegistry {
    pub fn new(
        defaults: EmbeddingConfig,
        tables: Arc<dyn TableFactory>,
        embedders: Arc<dyn EmbedderFactory>,
    ) -> Self {
        Self {
            defaults,
            tables,
            embedders,
            cells: Mutex::new(Cells::default()),
        }
    }

    /// Registry backed by [`MemoryTableFactory`] and the config-driven
    /// embedder factory.
    pub fn in_memory(defaults: EmbeddingConfig) -> Self {
        let embedders = Arc::new(DefaultEmbedderFactory::new(defaults.clone()));
        Self::new(defaults, Arc::new(MemoryTableFactory), embedders)
    }

    /// The provisioned table for `tenant`, creating it on first use.
    pub async fn get_table(&self, tenant: &Tenant) -> Result<Arc<dyn TenantTable>> {
        let table = TableName::parse(&tenant.table)?;
        if tenant.embedding_dim == 0 {
            return Err(StoreError::MissingConfig("tenant embedding_dim").into());
        }

        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.tables.entry(tenant.id).or_default())
        };

        let handle = cell
            .get_or_try_init(|| async {
                let handle = self
                    .tables
                    .open_table(table, tenant.id, tenant.embedding_dim)
                    .await?;
                handle.provision().await?;
                tracing::info!(
                    tenant = tenant.id,
                    table = %handle.table_name(),
                    "tenant table ready"
                );
                Ok::<_, anyhow::Error>(handle)
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// The embedding service for `tenant`'s resolved [`EmbeddingKey`].
    pub async fn get_embedder(&self, tenant: &Tenant) -> Result<Arc<EmbeddingService>> {
        let key = self.defaults.key_for(tenant);
        if self.defaults.for_key(&key).is_enabled() && key.model_repo.is_empty() {
            tracing::warn!(
                tenant = tenant.id,
                provider = %key.provider,
                "no embedding model configured for tenant or defaults"
            );
        }

        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.embedders.entry(key.clone()).or_default())
        };

        let service = cell
            .get_or_try_init(|| self.embedders.build_embedder(key))
            .await?;

        Ok(Arc::clone(service))
    }

    /// Number of tables built so far.
    pub fn table_count(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .tables
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Number of embedding services built so far.
    pub fn embedder_count(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .embedders
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}
