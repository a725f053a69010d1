//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! url = "postgres://localhost/vectorlab"
//!
//! [search]
//! weight_vector = 0.7
//! weight_text = 0.3
//!
//! [embedding]
//! provider = "openai"
//! model_repo = "text-embedding-3-small"
//!
//! [[tenants]]
//! id = 1
//! name = "acme"
//! table = "acme_docs"
//! embedding_dim = 1536
//! embedding_provider = "openai"
//! ```
//!
//! Tenants without an embedding provider or model fall back to the `[embedding]`
//! defaults; see [`EmbeddingConfig::key_for`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use vectorlab_core::models::{EmbeddingKey, Tenant};
use vectorlab_core::TableName;

/// Environment variable consulted when `[db] url` is unset.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Run `CREATE EXTENSION IF NOT EXISTS vector` while provisioning.
    #[serde(default = "default_true")]
    pub create_extension: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            create_extension: true,
        }
    }
}

impl DbConfig {
    /// The configured URL, or `$DATABASE_URL`.
    pub fn resolved_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var(DATABASE_URL_ENV).ok())
            .filter(|u| !u.trim().is_empty())
    }
}

fn default_max_connections() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `lists` parameter of the ivfflat embedding index.
    #[serde(default = "default_ivfflat_lists")]
    pub ivfflat_lists: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ivfflat_lists: default_ivfflat_lists(),
        }
    }
}

fn default_ivfflat_lists() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_vector_k")]
    pub vector_k: i64,
    #[serde(default = "default_weight")]
    pub weight_vector: f64,
    #[serde(default = "default_weight")]
    pub weight_text: f64,
    #[serde(default = "default_max_query_tokens")]
    pub max_query_tokens: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vector_k: default_vector_k(),
            weight_vector: default_weight(),
            weight_text: default_weight(),
            max_query_tokens: default_max_query_tokens(),
        }
    }
}

fn default_top_k() -> i64 {
    10
}
fn default_vector_k() -> i64 {
    50
}
fn default_weight() -> f64 {
    1.0
}
fn default_max_query_tokens() -> usize {
    vectorlab_core::normalize::DEFAULT_MAX_TOKENS
}

/// Process-wide embedding defaults.
///
/// Per-tenant services are derived from this with [`EmbeddingConfig::for_key`].
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier: an API model name, an Ollama tag, or a local model.
    #[serde(default)]
    pub model_repo: Option<String>,
    /// Model file within the repository, for providers that load weights.
    #[serde(default)]
    pub model_file: Option<String>,
    /// Cache directory for downloaded local models.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Embedding width. Set per tenant; only used by a derived config.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_repo: None,
            model_file: None,
            model_dir: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Resolve a tenant's embedding identity, falling back to these
    /// defaults for any model setting the tenant leaves unset.
    pub fn key_for(&self, tenant: &Tenant) -> EmbeddingKey {
        EmbeddingKey {
            provider: tenant
                .embedding_provider
                .clone()
                .unwrap_or_else(|| self.provider.clone()),
            model_repo: tenant
                .embedding_model_repo
                .clone()
                .or_else(|| self.model_repo.clone())
                .unwrap_or_default(),
            model_file: tenant
                .embedding_model_file
                .clone()
                .or_else(|| self.model_file.clone())
                .unwrap_or_default(),
            embed_dim: tenant.embedding_dim,
        }
    }

    /// Settings for one embedding service: these defaults with the key's
    /// provider, model and width applied.
    pub fn for_key(&self, key: &EmbeddingKey) -> EmbeddingConfig {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        EmbeddingConfig {
            provider: key.provider.clone(),
            model_repo: non_empty(&key.model_repo),
            model_file: non_empty(&key.model_file),
            dims: Some(key.embed_dim),
            ..self.clone()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

const KNOWN_PROVIDERS: &[&str] = &["disabled", "openai", "ollama", "local"];

impl Config {
    /// Look up a tenant by name or numeric id.
    pub fn tenant(&self, name_or_id: &str) -> Result<&Tenant> {
        self.tenants
            .iter()
            .find(|t| t.name == name_or_id || t.id.to_string() == name_or_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown tenant: '{}'", name_or_id))
    }
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.max_connections == 0 {
        bail!("db.max_connections must be >= 1");
    }
    if config.index.ivfflat_lists == 0 {
        bail!("index.ivfflat_lists must be >= 1");
    }

    let search = &config.search;
    if search.top_k < 1 {
        bail!("search.top_k must be >= 1");
    }
    if search.vector_k < 1 {
        bail!("search.vector_k must be >= 1");
    }
    if search.max_query_tokens == 0 {
        bail!("search.max_query_tokens must be >= 1");
    }
    if !search.weight_vector.is_finite() || !search.weight_text.is_finite() {
        bail!("search weights must be finite numbers");
    }

    check_provider(&config.embedding.provider)?;

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for tenant in &config.tenants {
        if !ids.insert(tenant.id) {
            bail!("Duplicate tenant id: {}", tenant.id);
        }
        if !names.insert(tenant.name.as_str()) {
            bail!("Duplicate tenant name: '{}'", tenant.name);
        }
        TableName::parse(&tenant.table)
            .with_context(|| format!("tenant '{}' has an invalid table", tenant.name))?;
        if tenant.embedding_dim == 0 {
            bail!("tenant '{}': embedding_dim must be > 0", tenant.name);
        }
        if let Some(provider) = &tenant.embedding_provider {
            check_provider(provider)?;
        }
    }

    Ok(config)
}

fn check_provider(provider: &str) -> Result<()> {
    if KNOWN_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            provider
        )
    }
}
