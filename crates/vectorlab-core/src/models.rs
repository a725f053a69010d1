//! Core data models: tenants, documents, and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{check_limit, check_weight, StoreError};

/// An isolated owner of one document table and one embedding model.
///
/// Tenants are supplied by the caller; Vectorlab only reads them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    /// Table identifier; must match `[a-z0-9_]+`.
    pub table: String,
    /// Embedding width, fixed when the tenant is created.
    pub embedding_dim: usize,
    /// Falls back to `[embedding] provider` when unset.
    #[serde(default)]
    pub embedding_provider: Option<String>,
    #[serde(default)]
    pub embedding_model_repo: Option<String>,
    #[serde(default)]
    pub embedding_model_file: Option<String>,
}

/// Identifies one embedding backend instance. Tenants whose keys match
/// share a single service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EmbeddingKey {
    pub provider: String,
    pub model_repo: String,
    pub model_file: String,
    pub embed_dim: usize,
}

/// Caller-supplied fields for a new document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub embedding: Vec<f32>,
}

/// A stored document row as returned by insert and fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    pub id: i64,
    pub project_id: i64,
    pub content: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for a single hybrid search.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Query embedding; must match the table width.
    pub embedding: Vec<f32>,
    /// Already-normalized lexical query. `None` or empty means vector-only.
    pub fts_query: Option<String>,
    /// Number of fused results returned.
    pub top_k: i64,
    /// Size of the vector candidate set.
    pub vector_k: i64,
    pub weight_vector: f64,
    pub weight_text: f64,
}

impl HybridQuery {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            fts_query: None,
            top_k: 10,
            vector_k: 50,
            weight_vector: 1.0,
            weight_text: 1.0,
        }
    }

    pub fn with_text(mut self, fts_query: impl Into<String>) -> Self {
        self.fts_query = Some(fts_query.into());
        self
    }

    pub fn with_limits(mut self, top_k: i64, vector_k: i64) -> Self {
        self.top_k = top_k;
        self.vector_k = vector_k;
        self
    }

    pub fn with_weights(mut self, weight_vector: f64, weight_text: f64) -> Self {
        self.weight_vector = weight_vector;
        self.weight_text = weight_text;
        self
    }

    /// Reject limits below 1 and non-finite weights. Backends call this
    /// before touching storage.
    pub fn validate(&self) -> Result<(), StoreError> {
        check_limit("top_k", self.top_k)?;
        check_limit("vector_k", self.vector_k)?;
        check_weight("weight_vector", self.weight_vector)?;
        check_weight("weight_text", self.weight_text)
    }

    /// The lexical query, if one was supplied and is non-empty.
    pub fn text(&self) -> Option<&str> {
        self.fts_query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// A fused search result joined back to its row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridHit {
    pub id: i64,
    pub content: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub created_at: DateTime<Utc>,
    /// `1 - distance`, or `0.0` when absent from the vector candidates.
    pub vector_score: f64,
    /// Cosine distance, or `1.0` when absent from the vector candidates.
    pub vector_distance: f64,
    /// Lexical rank, or `0.0` when absent from the lexical candidates.
    pub text_score: f64,
    pub hybrid_score: f64,
}

/// Debug view row: pure nearest-neighbour ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorMatch {
    pub id: i64,
    pub title: String,
    pub vector_distance: f64,
}

/// Debug view row: pure lexical ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMatch {
    pub id: i64,
    pub title: String,
    pub text_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_query_text_filters_blank() {
        let q = HybridQuery::new(vec![1.0]);
        assert_eq!(q.text(), None);
        let q = HybridQuery::new(vec![1.0]).with_text("  ");
        assert_eq!(q.text(), None);
        let q = HybridQuery::new(vec![1.0]).with_text("rust");
        assert_eq!(q.text(), Some("rust"));
    }

    #[test]
    fn test_hybrid_query_validate() {
        assert!(HybridQuery::new(vec![1.0]).validate().is_ok());

        let err = HybridQuery::new(vec![1.0])
            .with_limits(-1, 50)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { name: "top_k", .. }));

        let err = HybridQuery::new(vec![1.0])
            .with_limits(10, 0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { name: "vector_k", .. }));

        let err = HybridQuery::new(vec![1.0])
            .with_weights(1.0, f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { name: "weight_text", .. }));
    }

    #[test]
    fn test_tenant_deserialize_defaults() {
        let tenant: Tenant = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "acme",
            "table": "acme_docs",
            "embedding_dim": 3
        }))
        .unwrap();
        assert!(tenant.embedding_provider.is_none());
        assert!(tenant.embedding_model_repo.is_none());
    }
}
