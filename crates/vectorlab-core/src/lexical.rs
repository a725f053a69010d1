//! In-memory lexical index used by [`MemoryTable`](crate::table::memory::MemoryTable).
//!
//! Approximates PostgreSQL's `english` text search configuration closely
//! enough for tests and embedding-free tooling:
//!
//! - lower-cased `[a-z0-9_]` tokens, English stopwords dropped
//! - light plural stemming (`documents` → `document`, `queries` → `query`)
//! - title terms weighted `A` (1.0), content terms weighted `B` (0.4),
//!   the default `ts_rank` weights
//! - query syntax follows `websearch_to_tsquery` on normalized input:
//!   terms are AND-ed, and the bare word `or` separates alternatives
//!
//! The rank is not `ts_rank` itself: it is the weighted term frequency of
//! the matched terms divided by the number of query terms, which preserves
//! the orderings tests depend on (title hits beat body hits, more hits beat
//! fewer).

use std::collections::HashMap;

/// Weight for title terms (`setweight(..., 'A')`).
pub const WEIGHT_A: f64 = 1.0;
/// Weight for content terms (`setweight(..., 'B')`).
pub const WEIGHT_B: f64 = 0.4;

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had",
    "has", "have", "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "me", "my",
    "no", "not", "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "to", "was", "we", "were", "what", "when", "which",
    "who", "will", "with", "you", "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn stem(token: &str) -> String {
    if token.len() > 4 && token.ends_with("ies") {
        return format!("{}y", &token[..token.len() - 3]);
    }
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") && !token.ends_with("us")
    {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}

fn raw_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Lexemes of `text` after stopword removal and stemming, in order.
pub fn lexemes(text: &str) -> Vec<String> {
    raw_tokens(text)
        .filter(|t| !is_stopword(t))
        .map(|t| stem(&t))
        .collect()
}

/// A weighted bag of lexemes, the analogue of a `tsvector` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalVector {
    weights: HashMap<String, f64>,
}

impl LexicalVector {
    /// Build from a title (weight A) and content (weight B).
    pub fn from_document(title: &str, content: &str) -> Self {
        let mut weights: HashMap<String, f64> = HashMap::new();
        for lexeme in lexemes(title) {
            *weights.entry(lexeme).or_insert(0.0) += WEIGHT_A;
        }
        for lexeme in lexemes(content) {
            *weights.entry(lexeme).or_insert(0.0) += WEIGHT_B;
        }
        Self { weights }
    }

    fn weight(&self, lexeme: &str) -> Option<f64> {
        self.weights.get(lexeme).copied()
    }
}

/// A parsed lexical query: OR of AND-groups.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalQuery {
    groups: Vec<Vec<String>>,
}

impl LexicalQuery {
    /// Parse a normalized query. Returns `None` when nothing searchable
    /// remains (empty input, or only stopwords).
    pub fn parse(query: &str) -> Option<Self> {
        let mut groups: Vec<Vec<String>> = vec![Vec::new()];
        for token in raw_tokens(query) {
            if token == "or" {
                groups.push(Vec::new());
                continue;
            }
            if is_stopword(&token) {
                continue;
            }
            if let Some(group) = groups.last_mut() {
                group.push(stem(&token));
            }
        }
        groups.retain(|g| !g.is_empty());
        if groups.is_empty() {
            None
        } else {
            Some(Self { groups })
        }
    }

    /// Rank `doc` against this query, or `None` if it does not match.
    ///
    /// A document matches when every term of at least one group is present.
    /// The rank is the best group's summed weight over its term count.
    pub fn rank(&self, doc: &LexicalVector) -> Option<f64> {
        self.groups
            .iter()
            .filter_map(|group| {
                let total: Option<f64> = group.iter().map(|term| doc.weight(term)).sum();
                total.map(|t| t / group.len() as f64)
            })
            .fold(None, |best: Option<f64>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            })
    }
}
