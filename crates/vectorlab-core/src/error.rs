//! Domain error conditions.
//!
//! Storage-level failures are carried as `anyhow::Error` with context; the
//! variants here classify the failures that happen before any I/O, so
//! callers can tell a bad request from a broken database with
//! `err.downcast_ref::<StoreError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A table identifier failed the `[a-z0-9_]+` check.
    #[error("invalid vector store identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A required configuration value is absent.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// An embedding does not match the table's fixed width.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The table handle has not completed provisioning.
    #[error("table {0} has not been initialised")]
    NotInitialized(String),

    /// A search limit or weight is out of range.
    #[error("invalid search parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}

/// Fail with [`StoreError::DimensionMismatch`] unless `got == expected`.
pub fn check_dims(expected: usize, got: usize) -> Result<(), StoreError> {
    if expected == got {
        Ok(())
    } else {
        Err(StoreError::DimensionMismatch { expected, got })
    }
}

/// Result-count parameters (`top_k`, `vector_k`, debug `k` and `limit`)
/// must be at least 1.
pub fn check_limit(name: &'static str, value: i64) -> Result<(), StoreError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(StoreError::InvalidParameter {
            name,
            reason: "must be >= 1",
        })
    }
}

/// Fusion weights must be finite.
pub fn check_weight(name: &'static str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidParameter {
            name,
            reason: "must be a finite number",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dims() {
        assert!(check_dims(3, 3).is_ok());
        assert_eq!(
            check_dims(3, 4),
            Err(StoreError::DimensionMismatch {
                expected: 3,
                got: 4
            })
        );
    }

    #[test]
    fn test_check_limit() {
        assert!(check_limit("top_k", 1).is_ok());
        for bad in [0, -1, i64::MIN] {
            assert_eq!(
                check_limit("top_k", bad),
                Err(StoreError::InvalidParameter {
                    name: "top_k",
                    reason: "must be >= 1"
                })
            );
        }
    }

    #[test]
    fn test_check_weight() {
        assert!(check_weight("weight_text", 0.0).is_ok());
        assert!(check_weight("weight_text", -2.5).is_ok());
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                check_weight("weight_text", bad),
                Err(StoreError::InvalidParameter {
                    name: "weight_text",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::DimensionMismatch {
            expected: 384,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 384, got 3"
        );
        let err = StoreError::NotInitialized("acme_docs".into());
        assert_eq!(err.to_string(), "table acme_docs has not been initialised");
    }
}
