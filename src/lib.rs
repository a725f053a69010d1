//! # Vectorlab
//!
//! Multi-tenant hybrid retrieval on PostgreSQL. Each tenant owns one table
//! holding a pgvector embedding and a `tsvector` per document; queries fuse
//! approximate nearest-neighbour similarity with lexical rank into a single
//! ordered list.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │   CLI    │──▶│  TenantRegistry  │──▶│ PgTable (per tenant) │
//! │  (vlab)  │   │ tables+embedders │   │ pgvector + tsvector  │
//! └──────────┘   └────────┬─────────┘   └──────────────────────┘
//!                         ▼
//!                 ┌────────────────┐
//!                 │ EmbeddingService│
//!                 │ openai/ollama/… │
//!                 └────────────────┘
//! ```
//!
//! Runtime-free pieces (identifiers, fusion, the `TenantTable` trait and an
//! in-memory table) live in the `vectorlab-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! vlab init                               # provision every tenant table
//! vlab insert acme --title "Intro" --content "..."
//! vlab search acme "deployment checklist" --top-k 5
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | PostgreSQL pool |
//! | [`sql`] | SQL text for provisioning and queries |
//! | [`pg_table`] | pgvector-backed tenant table |
//! | [`registry`] | Per-tenant table and embedder cache |
//! | [`embedding`] | Embedding providers |
//! | [`search`] | Hybrid search and debug views |
//! | [`docs`] | Document and tenant commands |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod docs;
pub mod embedding;
pub mod logging;
pub mod pg_table;
pub mod registry;
pub mod search;
pub mod sql;

pub use vectorlab_core::{normalise_fts_query, StoreError, TableName};
