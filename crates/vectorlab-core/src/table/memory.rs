//! In-memory [`TenantTable`] for tests and embedding-free tooling.
//!
//! Rows live in a `BTreeMap` behind a single `Mutex`, which plays the role
//! of the store-wide lock in the PostgreSQL backend: every operation holds
//! it for its whole duration. Vector search is exact brute-force cosine
//! distance; lexical search uses [`crate::lexical`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::cosine_distance;
use crate::error::{check_dims, check_limit, StoreError};
use crate::fusion::{self, TextCandidate, VectorCandidate, Weights};
use crate::ident::TableName;
use crate::lexical::{LexicalQuery, LexicalVector};
use crate::models::{DocumentRow, HybridHit, HybridQuery, NewDocument, TextMatch, VectorMatch};

use super::TenantTable;

struct StoredRow {
    row: DocumentRow,
    embedding: Vec<f32>,
    text_search: LexicalVector,
    active: bool,
}

struct State {
    rows: BTreeMap<i64, StoredRow>,
    next_id: i64,
}

/// In-memory tenant table.
pub struct MemoryTable {
    table: TableName,
    tenant_id: i64,
    embed_dim: usize,
    ready: AtomicBool,
    state: Mutex<State>,
}

impl MemoryTable {
    pub fn new(table: TableName, tenant_id: i64, embed_dim: usize) -> Self {
        Self {
            table,
            tenant_id,
            embed_dim,
            ready: AtomicBool::new(false),
            state: Mutex::new(State {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized(self.table.to_string()))
        }
    }

    fn vector_candidates(state: &State, embedding: &[f32], k: i64) -> Vec<VectorCandidate> {
        let mut candidates: Vec<VectorCandidate> = state
            .rows
            .values()
            .filter(|r| r.active)
            .map(|r| {
                VectorCandidate::from_distance(r.row.id, cosine_distance(embedding, &r.embedding))
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.doc_id.cmp(&b.doc_id))
        });
        candidates.truncate(k.max(0) as usize);
        candidates
    }

    fn text_candidates(state: &State, fts_query: &str, k: i64) -> Vec<TextCandidate> {
        let Some(query) = LexicalQuery::parse(fts_query) else {
            return Vec::new();
        };
        let mut candidates: Vec<TextCandidate> = state
            .rows
            .values()
            .filter(|r| r.active)
            .filter_map(|r| {
                query.rank(&r.text_search).map(|score| TextCandidate {
                    doc_id: r.row.id,
                    score,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.doc_id.cmp(&b.doc_id))
        });
        candidates.truncate(k.max(0) as usize);
        candidates
    }
}

#[async_trait]
impl TenantTable for MemoryTable {
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
        let _state = self.lock();
        if !self.is_ready() {
            self.ready.store(true, Ordering::Release);
            tracing::info!(tenant = self.tenant_id, table = %self.table, "memory table initialised");
        }
        Ok(())
    }

    async fn insert_document(&self, doc: &NewDocument) -> Result<DocumentRow> {
        self.require_ready()?;
        check_dims(self.embed_dim, doc.embedding.len())?;

        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let row = DocumentRow {
            id,
            project_id: self.tenant_id,
            content: doc.content.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            published_at: doc.published_at.clone(),
            created_at: Utc::now(),
        };
        state.rows.insert(
            id,
            StoredRow {
                row: row.clone(),
                embedding: doc.embedding.clone(),
                text_search: LexicalVector::from_document(&doc.title, &doc.content),
                active: true,
            },
        );
        Ok(row)
    }

    async fn fetch_document(&self, id: i64) -> Result<Option<DocumentRow>> {
        self.require_ready()?;
        let state = self.lock();
        Ok(state
            .rows
            .get(&id)
            .filter(|r| r.active)
            .map(|r| r.row.clone()))
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        self.require_ready()?;
        Ok(self.lock().rows.remove(&id).is_some())
    }

    async fn count_documents(&self) -> Result<i64> {
        self.require_ready()?;
        Ok(self.lock().rows.values().filter(|r| r.active).count() as i64)
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<HybridHit>> {
        self.require_ready()?;
        query.validate()?;
        check_dims(self.embed_dim, query.embedding.len())?;

        let state = self.lock();
        let vector = Self::vector_candidates(&state, &query.embedding, query.vector_k);
        let text = match query.text() {
            Some(q) => Self::text_candidates(&state, q, fusion::text_k(query.vector_k, query.top_k)),
            None => Vec::new(),
        };
        let weights = Weights {
            vector: query.weight_vector,
            text: query.weight_text,
        };
        let fused = fusion::fuse(&vector, &text, weights, query.top_k as usize);

        let hits = fused
            .into_iter()
            .filter_map(|c| {
                state.rows.get(&c.doc_id).map(|r| HybridHit {
                    id: r.row.id,
                    content: r.row.content.clone(),
                    title: r.row.title.clone(),
                    url: r.row.url.clone(),
                    published_at: r.row.published_at.clone(),
                    created_at: r.row.created_at,
                    vector_score: c.vector_score.unwrap_or(0.0),
                    vector_distance: c.vector_distance.unwrap_or(1.0),
                    text_score: c.text_score.unwrap_or(0.0),
                    hybrid_score: c.hybrid_score,
                })
            })
            .collect();
        Ok(hits)
    }

    async fn debug_vector_matches(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorMatch>> {
        self.require_ready()?;
        check_limit("k", k)?;
        check_dims(self.embed_dim, embedding.len())?;

        let state = self.lock();
        Ok(Self::vector_candidates(&state, embedding, k)
            .into_iter()
            .filter_map(|c| {
                state.rows.get(&c.doc_id).map(|r| VectorMatch {
                    id: c.doc_id,
                    title: r.row.title.clone(),
                    vector_distance: c.distance,
                })
            })
            .collect())
    }

    async fn debug_text_matches(&self, fts_query: &str, limit: i64) -> Result<Vec<TextMatch>> {
        self.require_ready()?;
        check_limit("limit", limit)?;
        if fts_query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let state = self.lock();
        Ok(Self::text_candidates(&state, fts_query, limit)
            .into_iter()
            .filter_map(|c| {
                state.rows.get(&c.doc_id).map(|r| TextMatch {
                    id: c.doc_id,
                    title: r.row.title.clone(),
                    text_score: c.score,
                })
            })
            .collect())
    }
}
