//! SQL text for the pgvector tenant table.
//!
//! Every builder takes a [`TableName`], so only validated identifiers are
//! ever interpolated; all values go through bind parameters. Identifiers
//! are additionally double-quoted so names such as `user` or `2024_docs`
//! stay legal.
//!
//! # Hybrid Query Plan
//!
//! ```text
//! vector_matches ─┐                       (top vector_k by <=>, active only)
//!                 ├─ UNION ALL ─ GROUP BY doc_id ─▶ combined
//! text_matches ───┘                       (top text_k by ts_rank, or empty)
//!
//! combined ⋈ table ─▶ hybrid = v·w_v + t·w_t ─▶ ORDER BY hybrid DESC, id ASC
//! ```
//!
//! When no lexical query is supplied `text_matches` is an empty relation by
//! construction (`WHERE FALSE`), not a filter over all rows.

use vectorlab_core::ident::{index_name, TableName};

/// Text search configuration used for both indexing and querying.
pub const TS_CONFIG: &str = "english";

pub fn create_extension() -> &'static str {
    "CREATE EXTENSION IF NOT EXISTS vector"
}

pub fn create_table(table: &TableName, embed_dim: usize) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id BIGSERIAL PRIMARY KEY,
            project_id BIGINT NOT NULL,
            content TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            published_at TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            embedding vector({embed_dim}) NOT NULL,
            text_search TSVECTOR NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#
    )
}

/// The three index statements: tenant id, lexical (GIN), embedding (ivfflat).
pub fn create_indexes(table: &TableName, lists: u32) -> [String; 3] {
    [
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{}" ON "{table}" (project_id)"#,
            index_name(table, "project_idx")
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{}" ON "{table}" USING gin (text_search)"#,
            index_name(table, "text_idx")
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{}" ON "{table}" USING ivfflat (embedding vector_cosine_ops) WITH (lists = {lists})"#,
            index_name(table, "embedding_idx")
        ),
    ]
}

/// Declared type of the `embedding` column, e.g. `vector(384)`.
/// Bind: `$1` table name.
pub fn embedding_column_type() -> &'static str {
    r#"
    SELECT format_type(a.atttypid, a.atttypmod)
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    WHERE c.relname = $1
      AND pg_table_is_visible(c.oid)
      AND a.attname = 'embedding'
      AND NOT a.attisdropped
    "#
}

/// Parse the width out of a `vector(N)` type string.
pub fn parse_vector_width(type_name: &str) -> Option<usize> {
    type_name
        .trim()
        .strip_prefix("vector(")?
        .strip_suffix(')')?
        .parse()
        .ok()
}

/// Binds: `$1` project_id, `$2` content, `$3` title, `$4` url,
/// `$5` published_at, `$6` embedding.
pub fn insert_document(table: &TableName) -> String {
    format!(
        r#"
        INSERT INTO "{table}" (
            project_id, content, title, url, published_at, embedding, text_search
        )
        VALUES (
            $1, $2, $3, $4, $5, $6,
            setweight(to_tsvector('{TS_CONFIG}', coalesce($3, '')), 'A')
            ||
            setweight(to_tsvector('{TS_CONFIG}', coalesce($2, '')), 'B')
        )
        RETURNING id, project_id, content, title, url, published_at, created_at
        "#
    )
}

/// Binds: `$1` id.
pub fn fetch_document(table: &TableName) -> String {
    format!(
        r#"
        SELECT id, project_id, content, title, url, published_at, created_at
        FROM "{table}"
        WHERE id = $1 AND active = 1
        LIMIT 1
        "#
    )
}

/// Binds: `$1` id.
pub fn delete_document(table: &TableName) -> String {
    format!(r#"DELETE FROM "{table}" WHERE id = $1 RETURNING id"#)
}

pub fn count_documents(table: &TableName) -> String {
    format!(r#"SELECT COUNT(*) FROM "{table}" WHERE active = 1"#)
}

/// Transaction-local probe count. Binds: `$1` probes as text.
pub fn set_probes() -> &'static str {
    "SELECT set_config('ivfflat.probes', $1, true)"
}

/// The fused hybrid query.
///
/// Binds: `$1` embedding, `$2` vector_k, `$3` weight_vector,
/// `$4` weight_text, `$5` top_k, and when `with_text` is set,
/// `$6` lexical query and `$7` text_k.
pub fn hybrid_search(table: &TableName, with_text: bool) -> String {
    let text_matches = if with_text {
        format!(
            r#"
            SELECT
                id AS doc_id,
                ts_rank(text_search, websearch_to_tsquery('{TS_CONFIG}', $6))::float8 AS text_score
            FROM "{table}"
            WHERE websearch_to_tsquery('{TS_CONFIG}', $6) @@ text_search AND active = 1
            ORDER BY text_score DESC, id ASC
            LIMIT $7
            "#
        )
    } else {
        "SELECT NULL::bigint AS doc_id, NULL::float8 AS text_score WHERE FALSE".to_string()
    };

    format!(
        r#"
        WITH
        vector_matches AS (
            SELECT
                id AS doc_id,
                (1 - (embedding <=> $1))::float8 AS vector_score,
                (embedding <=> $1)::float8 AS vector_distance
            FROM "{table}"
            WHERE active = 1
            ORDER BY embedding <=> $1
            LIMIT $2
        ),
        text_matches AS (
            {text_matches}
        ),
        combined AS (
            SELECT
                doc_id,
                MAX(vector_score) AS vector_score,
                MAX(text_score) AS text_score,
                MIN(vector_distance) AS vector_distance
            FROM (
                SELECT doc_id, vector_score, NULL::float8 AS text_score, vector_distance
                FROM vector_matches
                UNION ALL
                SELECT doc_id, NULL::float8 AS vector_score, text_score, NULL::float8 AS vector_distance
                FROM text_matches
            ) AS unioned
            WHERE doc_id IS NOT NULL
            GROUP BY doc_id
        )
        SELECT
            d.id,
            d.content,
            d.title,
            d.url,
            d.published_at,
            d.created_at,
            COALESCE(c.vector_score, 0.0)::float8 AS vector_score,
            COALESCE(c.vector_distance, 1.0)::float8 AS vector_distance,
            COALESCE(c.text_score, 0.0)::float8 AS text_score,
            (
                COALESCE(c.vector_score, 0.0) * $3::float8
                +
                COALESCE(c.text_score, 0.0) * $4::float8
            )::float8 AS hybrid_score
        FROM combined c
        JOIN "{table}" d ON d.id = c.doc_id
        ORDER BY hybrid_score DESC, d.id ASC
        LIMIT $5
        "#
    )
}

/// Binds: `$1` embedding, `$2` k.
pub fn debug_vector_matches(table: &TableName) -> String {
    format!(
        r#"
        SELECT id, title, (embedding <=> $1)::float8 AS vector_distance
        FROM "{table}"
        WHERE active = 1
        ORDER BY embedding <=> $1
        LIMIT $2
        "#
    )
}

/// Binds: `$1` lexical query, `$2` limit.
pub fn debug_text_matches(table: &TableName) -> String {
    format!(
        r#"
        SELECT
            id,
            title,
            ts_rank(text_search, websearch_to_tsquery('{TS_CONFIG}', $1))::float8 AS text_score
        FROM "{table}"
        WHERE websearch_to_tsquery('{TS_CONFIG}', $1) @@ text_search AND active = 1
        ORDER BY text_score DESC, id ASC
        LIMIT $2
        "#
    )
}
