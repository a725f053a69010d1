//! # Vectorlab Core
//!
//! Runtime-free logic shared by every Vectorlab backend: the document data
//! model, validated table identifiers, lexical query normalization, hybrid
//! candidate fusion, and the [`table::TenantTable`] abstraction with an
//! in-memory implementation.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Storage
//! engines live in the `vectorlab` app crate.

pub mod embedding;
pub mod error;
pub mod fusion;
pub mod ident;
pub mod lexical;
pub mod models;
pub mod normalize;
pub mod table;

pub use error::StoreError;
pub use ident::TableName;
pub use normalize::normalise_fts_query;
