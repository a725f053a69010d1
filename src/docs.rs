//! Document and tenant management commands.
//!
//! | Command | Function |
//! |---------|----------|
//! | `vlab init` | [`run_init`] |
//! | `vlab tenants` | [`run_tenants`] |
//! | `vlab insert` | [`run_insert`] |
//! | `vlab get` | [`run_get`] |
//! | `vlab delete` | [`run_delete`] |
//! | `vlab count` | [`run_count`] |

use anyhow::{Context, Result};
use std::path::PathBuf;

use vectorlab_core::models::{DocumentRow, NewDocument, Tenant};

use crate::config::Config;
use crate::registry::TenantRegistry;

/// Fields for `vlab insert`. Exactly one of `content` / `file` is set.
#[derive(Debug, Clone, Default)]
pub struct InsertArgs {
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub content: Option<String>,
    pub file: Option<PathBuf>,
}

impl InsertArgs {
    fn body(&self) -> Result<String> {
        match (&self.content, &self.file) {
            (Some(content), None) => Ok(content.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            _ => anyhow::bail!("Provide exactly one of --content or --file"),
        }
    }
}

/// Provision every configured tenant.
pub async fn run_init(registry: &TenantRegistry, config: &Config) -> Result<()> {
    if config.tenants.is_empty() {
        println!("No tenants configured.");
        return Ok(());
    }

    for tenant in &config.tenants {
        let table = registry
            .get_table(tenant)
            .await
            .with_context(|| format!("failed to provision tenant '{}'", tenant.name))?;
        println!(
            "{:<16} {:<32} ready (dim {})",
            tenant.name,
            table.table_name().as_str(),
            table.embed_dim()
        );
    }
    Ok(())
}

/// List configured tenants with their resolved embedding keys.
pub fn run_tenants(config: &Config) -> Result<()> {
    if config.tenants.is_empty() {
        println!("No tenants configured.");
        return Ok(());
    }

    println!(
        "{:<6} {:<16} {:<24} {:<6} {:<10} MODEL",
        "ID", "NAME", "TABLE", "DIM", "PROVIDER"
    );
    for tenant in &config.tenants {
        let key = config.embedding.key_for(tenant);
        let model = if key.model_repo.is_empty() {
            "-"
        } else {
            key.model_repo.as_str()
        };
        println!(
            "{:<6} {:<16} {:<24} {:<6} {:<10} {}",
            tenant.id, tenant.name, tenant.table, key.embed_dim, key.provider, model
        );
    }
    Ok(())
}

/// Embed the content and insert one document for `tenant`.
pub async fn insert_for_tenant(
    registry: &TenantRegistry,
    tenant: &Tenant,
    title: &str,
    url: &str,
    published_at: &str,
    content: String,
) -> Result<DocumentRow> {
    let table = registry.get_table(tenant).await?;
    let embedder = registry.get_embedder(tenant).await?;

    let embedding = embedder.embed_query(&content).await?;
    table
        .insert_document(&NewDocument {
            content,
            title: title.to_string(),
            url: url.to_string(),
            published_at: published_at.to_string(),
            embedding,
        })
        .await
}

pub async fn run_insert(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    args: &InsertArgs,
) -> Result<()> {
    let tenant = config.tenant(tenant)?;
    let content = args.body()?;
    let row = insert_for_tenant(
        registry,
        tenant,
        &args.title,
        &args.url,
        &args.published_at,
        content,
    )
    .await?;

    println!("Inserted document {} into {}.", row.id, tenant.table);
    Ok(())
}

pub async fn run_get(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    id: i64,
) -> Result<()> {
    let tenant = config.tenant(tenant)?;
    let table = registry.get_table(tenant).await?;

    let Some(doc) = table.fetch_document(id).await? else {
        anyhow::bail!("Document {} not found in tenant '{}'", id, tenant.name);
    };

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("project_id:   {}", doc.project_id);
    println!("title:        {}", doc.title);
    println!("url:          {}", doc.url);
    println!("published_at: {}", doc.published_at);
    println!("created_at:   {}", doc.created_at.to_rfc3339());
    println!();
    println!("--- Content ---");
    println!("{}", doc.content);
    Ok(())
}

pub async fn run_delete(
    registry: &TenantRegistry,
    config: &Config,
    tenant: &str,
    id: i64,
) -> Result<()> {
    let tenant = config.tenant(tenant)?;
    let table = registry.get_table(tenant).await?;

    if table.delete_document(id).await? {
        println!("Deleted document {}.", id);
    } else {
        println!("Document {} not found.", id);
    }
    Ok(())
}

pub async fn run_count(registry: &TenantRegistry, config: &Config, tenant: &str) -> Result<()> {
    let tenant = config.tenant(tenant)?;
    let table = registry.get_table(tenant).await?;
    println!("{}", table.count_documents().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_body_from_content() {
        let args = InsertArgs {
            content: Some("hello".into()),
            ..InsertArgs::default()
        };
        assert_eq!(args.body().unwrap(), "hello");
    }

    #[test]
    fn test_body_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from disk").unwrap();
        let args = InsertArgs {
            file: Some(file.path().to_path_buf()),
            ..InsertArgs::default()
        };
        assert_eq!(args.body().unwrap(), "from disk");
    }

    #[test]
    fn test_body_requires_exactly_one_source() {
        assert!(InsertArgs::default().body().is_err());
        let both = InsertArgs {
            content: Some("a".into()),
            file: Some(PathBuf::from("b")),
            ..InsertArgs::default()
        };
        assert!(both.body().is_err());
    }
}
