//! Search commands: hybrid search plus the two single-signal debug views.
//!
//! A search resolves the tenant's table and embedder through the
//! [`TenantRegistry`], normalizes the query text for the lexical side,
//! embeds the raw query for the vector side, and hands both to
//! [`TenantTable::hybrid_search`](vectorlab_core::table::TenantTable::hybrid_search).

use anyhow::Result;

use vectorlab_core::error::check_limit;
use vectorlab_core::models::{HybridHit, HybridQuery, Tenant};
use vectorlab_core::{normalise_fts_query, StoreError};

use crate::config::{Config, SearchConfig};
use crate::registry::TenantRegistry;

/// Per-call overrides of the `[search]` defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<i64>,
    pub vector_k: Option<i64>,
    pub weight_vector: Option<f64>,
    pub weight_text: Option<f64>,
    /// Skip the lexical signal entirely.
    pub vector_only: bool,
}

/// Assemble a [`HybridQuery`] from config defaults, overrides and the raw
/// query text. The text is normalized; a query with no usable tokens
/// becomes vector-only. Out-of-range overrides fail with
/// [`StoreError::InvalidParameter`].
pub fn build_query(
    search: &SearchConfig,
    embedding: Vec<f32>,
    text: &str,
    opts: &SearchOptions,
) -> Result<HybridQuery, StoreError> {
    let mut query = HybridQuery::new(embedding)
        .with_limits(
            opts.top_k.unwrap_or(search.top_k),
            opts.vector_k.unwrap_or(search.vector_k),
        )
        .with_weights(
            opts.weight_vector.unwrap_or(search.weight_vector),
            opts.weight_text.unwrap_or(search.weight_text),
        );

    if !opts.vector_only {
        let normalized = normalise_fts_query(text, search.max_query_tokens);
        if !normalized.is_empty() {
            query = query.with_text(normalized);
        }
    }
    query.validate()?;
    Ok(query)
}

/// Run one hybrid search for `tenant` and return the fused hits.
pub async fn search_tenant(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &Tenant,
    text: &str,
    opts: &SearchOptions,
) -> Result<Vec<HybridHit>> {
    let table = registry.get_table(tenant).await?;
    let embedder = registry.get_embedder(tenant).await?;

    // Parameters are checked before the embedding call.
    let mut query = build_query(&config.search, Vec::new(), text, opts)?;
    query.embedding = embedder.embed_query(text).await?;

    tracing::debug!(
        tenant = tenant.id,
        fts = query.text().unwrap_or(""),
        top_k = query.top_k,
        vector_k = query.vector_k,
        "running hybrid search"
    );
    table.hybrid_search(&query).await
}

pub async fn run_search(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    text: &str,
    opts: &SearchOptions,
    json: bool,
) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let tenant = config.tenant(tenant)?;
    let hits = search_tenant(registry, config, tenant, text, opts).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = if hit.title.is_empty() {
            "(untitled)"
        } else {
            hit.title.as_str()
        };
        println!("{}. [{:.3}] {}", i + 1, hit.hybrid_score, title);
        println!(
            "    vector: {:.3} (distance {:.3})  text: {:.3}",
            hit.vector_score, hit.vector_distance, hit.text_score
        );
        if !hit.url.is_empty() {
            println!("    url: {}", hit.url);
        }
        if !hit.published_at.is_empty() {
            println!("    published: {}", hit.published_at);
        }
        println!("    excerpt: \"{}\"", excerpt(&hit.content, 160));
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}

/// Pure nearest-neighbour ranking for `text`.
pub async fn run_debug_vector(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    text: &str,
    k: i64,
) -> Result<()> {
    check_limit("k", k)?;
    let tenant = config.tenant(tenant)?;
    let table = registry.get_table(tenant).await?;
    let embedder = registry.get_embedder(tenant).await?;

    let embedding = embedder.embed_query(text).await?;
    let matches = table.debug_vector_matches(&embedding, k).await?;

    if matches.is_empty() {
        println!("No results.");
    }
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. [{:.4}] {} (id {})",
            i + 1,
            m.vector_distance,
            m.title,
            m.id
        );
    }
    Ok(())
}

/// Pure lexical ranking for `text`, after normalization.
pub async fn run_debug_text(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    text: &str,
    limit: i64,
) -> Result<()> {
    let tenant = config.tenant(tenant)?;
    let table = registry.get_table(tenant).await?;

    let normalized = normalise_fts_query(text, config.search.max_query_tokens);
    let matches = table.debug_text_matches(&normalized, limit).await?;

    if matches.is_empty() {
        println!("No results.");
    }
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. [{:.4}] {} (id {})",
            i + 1,
            m.text_score,
            m.title,
            m.id
        );
    }
    Ok(())
}

fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
