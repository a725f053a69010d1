//! # Vectorlab CLI (`vlab`)
//!
//! ## Usage
//!
//! ```bash
//! vlab --config ./config/vectorlab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vlab init` | Provision every configured tenant table |
//! | `vlab tenants` | List tenants and their embedding models |
//! | `vlab insert <tenant>` | Embed and insert a document |
//! | `vlab get <tenant> <id>` | Print a document |
//! | `vlab delete <tenant> <id>` | Delete a document |
//! | `vlab count <tenant>` | Count documents |
//! | `vlab search <tenant> "<query>"` | Hybrid search |
//! | `vlab debug vector <tenant> "<query>"` | Nearest neighbours only |
//! | `vlab debug text <tenant> "<query>"` | Lexical rank only |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use vectorlab::config;
use vectorlab::db;
use vectorlab::docs::{self, InsertArgs};
use vectorlab::logging;
use vectorlab::pg_table::PgTableFactory;
use vectorlab::registry::{DefaultEmbedderFactory, TenantRegistry};
use vectorlab::search::{self, SearchOptions};

/// Vectorlab CLI: multi-tenant hybrid vector and full-text search on PostgreSQL.
#[derive(Parser)]
#[command(
    name = "vlab",
    about = "Vectorlab: multi-tenant hybrid search on PostgreSQL + pgvector",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vectorlab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every configured tenant.
    ///
    /// Creates each tenant's table and its three indexes. Idempotent.
    Init,

    /// List configured tenants.
    Tenants,

    /// Embed a document and insert it.
    Insert {
        /// Tenant name or id.
        tenant: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        url: String,

        /// Free-form publication date, stored as given.
        #[arg(long, default_value = "")]
        published_at: String,

        /// Document text.
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read document text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print a document by id.
    Get { tenant: String, id: i64 },

    /// Permanently delete a document by id.
    Delete { tenant: String, id: i64 },

    /// Count documents in a tenant table.
    Count { tenant: String },

    /// Hybrid vector + full-text search.
    Search {
        tenant: String,
        query: String,

        /// Number of results returned.
        #[arg(long)]
        top_k: Option<i64>,

        /// Size of the vector candidate set.
        #[arg(long)]
        vector_k: Option<i64>,

        #[arg(long)]
        weight_vector: Option<f64>,

        #[arg(long)]
        weight_text: Option<f64>,

        /// Ignore the lexical signal.
        #[arg(long)]
        vector_only: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect one ranking signal at a time.
    Debug {
        #[command(subcommand)]
        view: DebugView,
    },
}

#[derive(Subcommand)]
enum DebugView {
    /// Nearest neighbours by cosine distance.
    Vector {
        tenant: String,
        query: String,
        #[arg(long, default_value_t = 10)]
        k: i64,
    },
    /// Lexical rank of the normalized query.
    Text {
        tenant: String,
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    if let Commands::Tenants = cli.command {
        return docs::run_tenants(&cfg);
    }

    let pool = db::connect(&cfg).await?;
    let registry = TenantRegistry::new(
        cfg.embedding.clone(),
        Arc::new(PgTableFactory::new(pool.clone(), &cfg)),
        Arc::new(DefaultEmbedderFactory::new(cfg.embedding.clone())),
    );

    let result = match cli.command {
        Commands::Init => docs::run_init(&registry, &cfg).await,
        Commands::Tenants => docs::run_tenants(&cfg),
        Commands::Insert {
            tenant,
            title,
            url,
            published_at,
            content,
            file,
        } => {
            let args = InsertArgs {
                title,
                url,
                published_at,
                content,
                file,
            };
            docs::run_insert(&registry, &cfg, &tenant, &args).await
        }
        Commands::Get { tenant, id } => docs::run_get(&registry, &cfg, &tenant, id).await,
        Commands::Delete { tenant, id } => docs::run_delete(&registry, &cfg, &tenant, id).await,
        Commands::Count { tenant } => docs::run_count(&registry, &cfg, &tenant).await,
        Commands::Search {
            tenant,
            query,
            top_k,
            vector_k,
            weight_vector,
            weight_text,
            vector_only,
            json,
        } => {
            let opts = SearchOptions {
                top_k,
                vector_k,
                weight_vector,
                weight_text,
                vector_only,
            };
            search::run_search(&registry, &cfg, &tenant, &query, &opts, json).await
        }
        Commands::Debug { view } => match view {
            DebugView::Vector { tenant, query, k } => {
                search::run_debug_vector(&registry, &cfg, &tenant, &query, k).await
            }
            DebugView::Text {
                tenant,
                query,
                limit,
            } => search::run_debug_text(&registry, &cfg, &tenant, &query, limit).await,
        },
    };

    pool.close().await;
    result
}
