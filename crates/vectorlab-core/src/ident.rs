//! Validated SQL identifiers.
//!
//! Table and index names are interpolated into query text (bind parameters
//! only cover values), so every identifier that reaches a SQL builder goes
//! through [`TableName::parse`] first. The character set is restricted to
//! `[a-z0-9_]`, which needs no escaping in PostgreSQL.
//!
//! # Index Naming
//!
//! PostgreSQL truncates identifiers longer than 63 bytes, so two long table
//! names sharing a prefix could silently map to the same index. [`index_name`]
//! trims the table part and appends a short content hash of the full name
//! instead:
//!
//! ```rust
//! use vectorlab_core::ident::{index_name, TableName};
//!
//! let table = TableName::parse("acme_docs").unwrap();
//! assert_eq!(index_name(&table, "text_idx"), "acme_docs_text_idx");
//! ```

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::StoreError;

/// Maximum identifier length accepted by PostgreSQL (`NAMEDATALEN - 1`).
pub const MAX_IDENT_LEN: usize = 63;

const HASH_LEN: usize = 8;

/// A table identifier guaranteed to match `^[a-z0-9_]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableName(String);

impl TableName {
    /// Validate `raw` and wrap it.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if is_safe_ident(raw) && raw.len() <= MAX_IDENT_LEN {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_safe_ident(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Derive a deterministic index name for `table` with a purpose `suffix`.
///
/// Returns `"{table}_{suffix}"` when it fits within [`MAX_IDENT_LEN`].
/// Otherwise the table part is truncated and the first 8 hex characters of
/// the SHA-256 of the full intended name are appended, so distinct tables
/// never collide on truncation alone.
pub fn index_name(table: &TableName, suffix: &str) -> String {
    let candidate = format!("{}_{}", table.as_str(), suffix);
    if candidate.len() <= MAX_IDENT_LEN {
        return candidate;
    }

    let digest = hex::encode(Sha256::digest(candidate.as_bytes()));
    let budget = MAX_IDENT_LEN
        .saturating_sub(suffix.len() + HASH_LEN + 2)
        .max(1);
    let trimmed = &table.as_str()[..budget.min(table.as_str().len())];
    format!("{}_{}_{}", trimmed, suffix, &digest[..HASH_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_safe_names() {
        for name in ["docs", "acme_docs", "tenant_42", "0abc", "_"] {
            assert!(TableName::parse(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn test_parse_rejects_unsafe_names() {
        for name in [
            "",
            "Docs",
            "acme-docs",
            "acme docs",
            "docs;drop table users",
            "\"docs\"",
            "dócs",
        ] {
            assert_eq!(
                TableName::parse(name),
                Err(StoreError::InvalidIdentifier(name.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_rejects_overlong_names() {
        let long = "a".repeat(MAX_IDENT_LEN + 1);
        assert!(TableName::parse(&long).is_err());
        assert!(TableName::parse(&"a".repeat(MAX_IDENT_LEN)).is_ok());
    }

    #[test]
    fn test_index_name_short() {
        let t = TableName::parse("acme_docs").unwrap();
        assert_eq!(index_name(&t, "project_idx"), "acme_docs_project_idx");
        assert_eq!(index_name(&t, "embedding_idx"), "acme_docs_embedding_idx");
    }

    #[test]
    fn test_index_name_long_is_bounded_and_hashed() {
        let t = TableName::parse(&"x".repeat(60)).unwrap();
        let name = index_name(&t, "embedding_idx");
        assert!(name.len() <= MAX_IDENT_LEN, "{} too long", name);
        assert!(name.contains("_embedding_idx_"));
        let hash = name.rsplit('_').next().unwrap();
        assert_eq!(hash.len(), HASH_LEN);
        assert!(TableName::parse(&name).is_ok());
    }

    #[test]
    fn test_index_name_long_prefix_collision_avoided() {
        let base = "y".repeat(55);
        let a = TableName::parse(&format!("{base}_a")).unwrap();
        let b = TableName::parse(&format!("{base}_b")).unwrap();
        assert_ne!(index_name(&a, "text_idx"), index_name(&b, "text_idx"));
    }

    #[test]
    fn test_index_name_deterministic() {
        let t = TableName::parse(&"z".repeat(62)).unwrap();
        assert_eq!(index_name(&t, "text_idx"), index_name(&t, "text_idx"));
    }
}
