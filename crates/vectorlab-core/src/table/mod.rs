//! Tenant table abstraction.
//!
//! The [`TenantTable`] trait covers everything a caller does with one
//! tenant's document table: provisioning, the document store operations,
//! hybrid search, and the two debug ranking views. Backends:
//!
//! - `PgTable` in the `vectorlab` crate (PostgreSQL + pgvector)
//! - [`memory::MemoryTable`] here, for tests and embedding-free tooling
//!
//! Implementations must be `Send + Sync`; a single handle is shared by
//! every caller of a tenant.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::ident::TableName;
use crate::models::{DocumentRow, HybridHit, HybridQuery, NewDocument, TextMatch, VectorMatch};

/// One tenant's document table.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`provision`](TenantTable::provision) | Create table and indexes (idempotent) |
/// | [`insert_document`](TenantTable::insert_document) | Insert one row, return it |
/// | [`fetch_document`](TenantTable::fetch_document) | Active row by id |
/// | [`delete_document`](TenantTable::delete_document) | Hard delete by id |
/// | [`count_documents`](TenantTable::count_documents) | Count active rows |
/// | [`hybrid_search`](TenantTable::hybrid_search) | Fused vector + lexical ranking |
/// | [`debug_vector_matches`](TenantTable::debug_vector_matches) | Vector ranking only |
/// | [`debug_text_matches`](TenantTable::debug_text_matches) | Lexical ranking only |
///
/// Every operation except `provision` fails with
/// [`StoreError::NotInitialized`](crate::StoreError::NotInitialized) until
/// provisioning has succeeded.
#[async_trait]
pub trait TenantTable: Send + Sync {
    fn table_name(&self) -> &TableName;

    fn tenant_id(&self) -> i64;

    fn embed_dim(&self) -> usize;

    fn is_ready(&self) -> bool;

    /// Create the table and its indexes if missing. Calls after the first
    /// success are no-ops.
    async fn provision(&self) -> Result<()>;

    /// Insert a document. Fails with a dimension mismatch before touching
    /// storage when the embedding width is wrong.
    async fn insert_document(&self, doc: &NewDocument) -> Result<DocumentRow>;

    async fn fetch_document(&self, id: i64) -> Result<Option<DocumentRow>>;

    /// Remove the row regardless of its active flag. Returns whether a row
    /// existed.
    async fn delete_document(&self, id: i64) -> Result<bool>;

    async fn count_documents(&self) -> Result<i64>;

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<HybridHit>>;

    async fn debug_vector_matches(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorMatch>>;

    async fn debug_text_matches(&self, fts_query: &str, limit: i64) -> Result<Vec<TextMatch>>;
}
