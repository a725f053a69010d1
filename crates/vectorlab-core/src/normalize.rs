//! Lexical query normalization.
//!
//! Free-text search input is reduced to lower-case runs of ASCII letters,
//! digits, and underscore before it reaches `websearch_to_tsquery`. Every
//! other character is a separator, so quoting, negation, and other parser
//! syntax never survive, and the token cap bounds pathological inputs.

/// Default cap on the number of tokens kept by [`normalise_fts_query`].
pub const DEFAULT_MAX_TOKENS: usize = 16;

/// Normalize `query` into at most `max_tokens` space-separated tokens.
///
/// Returns an empty string when no usable tokens exist.
///
/// ```rust
/// use vectorlab_core::normalise_fts_query;
///
/// assert_eq!(normalise_fts_query("Hello, World! 123", 16), "hello world 123");
/// assert_eq!(normalise_fts_query("¿¡!?", 16), "");
/// ```
pub fn normalise_fts_query(query: &str, max_tokens: usize) -> String {
    let lowered = query.to_lowercase();
    lowered
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}
