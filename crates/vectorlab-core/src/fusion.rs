//! Additive fusion of vector and lexical candidate sets.
//!
//! This is the in-process twin of the `combined` CTE the PostgreSQL engine
//! runs, and the two must agree:
//!
//! 1. Union both candidate sets by document id.
//! 2. Per id keep the maximum vector score, the maximum lexical score, and
//!    the minimum distance seen.
//! 3. A signal an id is missing from counts as zero.
//! 4. `hybrid = vector_score × weight_vector + text_score × weight_text`,
//!    weights applied verbatim (they need not sum to 1).
//! 5. Sort by hybrid score descending, then id ascending, and keep `top_k`.

use std::collections::BTreeMap;

/// Upper bound for the per-query `ivfflat.probes` setting.
pub const MAX_PROBES: i64 = 64;

/// A row from the vector candidate set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorCandidate {
    pub doc_id: i64,
    /// `1 - distance`.
    pub score: f64,
    pub distance: f64,
}

impl VectorCandidate {
    pub fn from_distance(doc_id: i64, distance: f64) -> Self {
        Self {
            doc_id,
            score: 1.0 - distance,
            distance,
        }
    }
}

/// A row from the lexical candidate set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextCandidate {
    pub doc_id: i64,
    pub score: f64,
}

/// One fused candidate, before it is joined back to row content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedCandidate {
    pub doc_id: i64,
    pub vector_score: Option<f64>,
    pub vector_distance: Option<f64>,
    pub text_score: Option<f64>,
    pub hybrid_score: f64,
}

/// Caller-supplied signal weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub vector: f64,
    pub text: f64,
}

/// Search-time probe count for a vector candidate set of size `vector_k`.
pub fn probes_for(vector_k: i64) -> i64 {
    vector_k.clamp(1, MAX_PROBES)
}

/// Size of the lexical candidate set: `max(vector_k, top_k)`.
pub fn text_k(vector_k: i64, top_k: i64) -> i64 {
    vector_k.max(top_k)
}

fn max_opt(current: Option<f64>, next: f64) -> Option<f64> {
    Some(current.map_or(next, |c| c.max(next)))
}

fn min_opt(current: Option<f64>, next: f64) -> Option<f64> {
    Some(current.map_or(next, |c| c.min(next)))
}

/// Fuse both candidate sets and return the ranked top `top_k`.
pub fn fuse(
    vector: &[VectorCandidate],
    text: &[TextCandidate],
    weights: Weights,
    top_k: usize,
) -> Vec<FusedCandidate> {
    let mut combined: BTreeMap<i64, FusedCandidate> = BTreeMap::new();

    for v in vector {
        let entry = combined.entry(v.doc_id).or_insert_with(|| empty(v.doc_id));
        entry.vector_score = max_opt(entry.vector_score, v.score);
        entry.vector_distance = min_opt(entry.vector_distance, v.distance);
    }
    for t in text {
        let entry = combined.entry(t.doc_id).or_insert_with(|| empty(t.doc_id));
        entry.text_score = max_opt(entry.text_score, t.score);
    }

    let mut fused: Vec<FusedCandidate> = combined
        .into_values()
        .map(|mut c| {
            c.hybrid_score = c.vector_score.unwrap_or(0.0) * weights.vector
                + c.text_score.unwrap_or(0.0) * weights.text;
            c
        })
        .collect();

    fused.sort_by(|a, b| {
        b.hybrid_score
            .partial_cmp(&a.hybrid_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.doc_id.cmp(&b.doc_id))
    });
    fused.truncate(top_k);
    fused
}

fn empty(doc_id: i64) -> FusedCandidate {
    FusedCandidate {
        doc_id,
        vector_score: None,
        vector_distance: None,
        text_score: None,
        hybrid_score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EQUAL: Weights = Weights {
        vector: 1.0,
        text: 1.0,
    };

    fn ids(fused: &[FusedCandidate]) -> Vec<i64> {
        fused.iter().map(|c| c.doc_id).collect()
    }

    #[test]
    fn test_probes_clamped() {
        assert_eq!(probes_for(0), 1);
        assert_eq!(probes_for(-5), 1);
        assert_eq!(probes_for(10), 10);
        assert_eq!(probes_for(500), 64);
    }

    #[test]
    fn test_text_k() {
        assert_eq!(text_k(50, 10), 50);
        assert_eq!(text_k(5, 10), 10);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(&[], &[], EQUAL, 10).is_empty());
    }

    #[test]
    fn test_text_only_document_surfaces() {
        let vector = vec![VectorCandidate::from_distance(1, 0.9)];
        let text = vec![TextCandidate {
            doc_id: 2,
            score: 0.5,
        }];
        let weights = Weights {
            vector: 1.0,
            text: 2.0,
        };
        let fused = fuse(&vector, &text, weights, 10);
        let two = fused.iter().find(|c| c.doc_id == 2).unwrap();
        assert!((two.hybrid_score - 1.0).abs() < 1e-9);
        assert_eq!(two.vector_score, None);
        assert_eq!(two.vector_distance, None);
    }

    #[test]
    fn test_both_signals_additive() {
        let vector = vec![VectorCandidate::from_distance(1, 0.2)];
        let text = vec![TextCandidate {
            doc_id: 1,
            score: 0.3,
        }];
        let weights = Weights {
            vector: 0.5,
            text: 2.0,
        };
        let fused = fuse(&vector, &text, weights, 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].hybrid_score - (0.8 * 0.5 + 0.3 * 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_duplicates_take_max_and_min_distance() {
        let vector = vec![
            VectorCandidate::from_distance(1, 0.6),
            VectorCandidate::from_distance(1, 0.1),
        ];
        let text = vec![
            TextCandidate {
                doc_id: 1,
                score: 0.2,
            },
            TextCandidate {
                doc_id: 1,
                score: 0.4,
            },
        ];
        let fused = fuse(&vector, &text, EQUAL, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].vector_distance, Some(0.1));
        assert_eq!(fused[0].vector_score, Some(0.9));
        assert_eq!(fused[0].text_score, Some(0.4));
    }

    #[test]
    fn test_order_and_cut() {
        let vector = vec![
            VectorCandidate::from_distance(1, 0.5),
            VectorCandidate::from_distance(2, 0.1),
            VectorCandidate::from_distance(3, 0.3),
        ];
        let fused = fuse(&vector, &[], EQUAL, 2);
        assert_eq!(ids(&fused), vec![2, 3]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let vector = vec![
            VectorCandidate::from_distance(9, 0.5),
            VectorCandidate::from_distance(4, 0.5),
            VectorCandidate::from_distance(7, 0.5),
        ];
        assert_eq!(ids(&fuse(&vector, &[], EQUAL, 10)), vec![4, 7, 9]);
    }

    #[test]
    fn test_zero_weight_ignores_signal() {
        let vector = vec![
            VectorCandidate::from_distance(1, 0.0),
            VectorCandidate::from_distance(2, 0.9),
        ];
        let text = vec![TextCandidate {
            doc_id: 2,
            score: 10.0,
        }];
        let weights = Weights {
            vector: 1.0,
            text: 0.0,
        };
        assert_eq!(ids(&fuse(&vector, &text, weights, 1)), vec![1]);
    }
}
