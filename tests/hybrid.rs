//! End-to-end hybrid search through the registry on in-memory tables.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use vectorlab::config::{parse_config, Config};
use vectorlab::docs::insert_for_tenant;
use vectorlab::embedding::{EmbeddingProvider, EmbeddingService};
use vectorlab::registry::{EmbedderFactory, MemoryTableFactory, TenantRegistry};
use vectorlab::search::{search_tenant, SearchOptions};
use vectorlab_core::models::EmbeddingKey;
use vectorlab_core::StoreError;

const CONFIG: &str = r#"
[[tenants]]
id = 1
name = "acme"
table = "acme_docs"
embedding_dim = 3

[[tenants]]
id = 2
name = "globex"
table = "globex_docs"
embedding_dim = 3
"#;

/// Three topic axes; each keyword hit adds weight on its axis.
struct TopicProvider;

const TOPICS: [&[&str]; 3] = [
    &["rust", "cargo", "crates"],
    &["python", "learning", "pytorch"],
    &["kubernetes", "docker", "deployment"],
];

#[async_trait]
impl EmbeddingProvider for TopicProvider {
    fn model_name(&self) -> &str {
        "topics"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                TOPICS
                    .iter()
                    .map(|words| {
                        0.1 + words.iter().filter(|w| lower.contains(**w)).count() as f32
                    })
                    .collect()
            })
            .collect())
    }
}

struct TopicEmbedders;

#[async_trait]
impl EmbedderFactory for TopicEmbedders {
    async fn build_embedder(&self, key: EmbeddingKey) -> Result<Arc<EmbeddingService>> {
        Ok(Arc::new(EmbeddingService::new(key, Box::new(TopicProvider))))
    }
}

fn setup() -> (Config, Arc<TenantRegistry>) {
    let config = parse_config(CONFIG).unwrap();
    let registry = Arc::new(TenantRegistry::new(
        config.embedding.clone(),
        Arc::new(MemoryTableFactory),
        Arc::new(TopicEmbedders),
    ));
    (config, registry)
}

async fn seed(config: &Config, registry: &TenantRegistry) {
    let acme = config.tenant("acme").unwrap();
    let docs = [
        (
            "Alpha",
            "The alpha document is about Rust programming with cargo and crates.",
        ),
        (
            "Beta",
            "This document discusses Python and machine learning with PyTorch.",
        ),
        (
            "Gamma",
            "Notes about deployment and infrastructure. Kubernetes and Docker are mentioned.",
        ),
    ];
    for (title, content) in docs {
        insert_for_tenant(
            registry,
            acme,
            title,
            &format!("https://example.com/{}", title.to_lowercase()),
            "2024-01-01",
            content.to_string(),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_hybrid_ranks_best_match_first() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let acme = config.tenant("acme").unwrap();

    let hits = search_tenant(
        &registry,
        &config,
        acme,
        "rust crates",
        &SearchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].title, "Alpha");
    assert!(hits[0].text_score > 0.0);
    assert!(hits[0].vector_score > hits[1].vector_score);
    for hit in &hits[1..] {
        assert_eq!(hit.text_score, 0.0);
    }
    for pair in hits.windows(2) {
        assert!(pair[0].hybrid_score >= pair[1].hybrid_score);
    }
}

#[tokio::test]
async fn test_text_weight_only_breaks_ties_by_id() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let acme = config.tenant("acme").unwrap();

    let opts = SearchOptions {
        weight_vector: Some(0.0),
        weight_text: Some(1.0),
        ..SearchOptions::default()
    };
    let hits = search_tenant(&registry, &config, acme, "kubernetes", &opts)
        .await
        .unwrap();

    let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["Gamma", "Alpha", "Beta"]);
    assert_eq!(hits[1].hybrid_score, 0.0);
    assert!(hits[1].id < hits[2].id);
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let acme = config.tenant("acme").unwrap();

    let opts = SearchOptions {
        top_k: Some(1),
        ..SearchOptions::default()
    };
    let hits = search_tenant(&registry, &config, acme, "python learning", &opts)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Beta");
}

#[tokio::test]
async fn test_invalid_overrides_fail_before_search() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let acme = config.tenant("acme").unwrap();

    for opts in [
        SearchOptions {
            top_k: Some(-1),
            ..SearchOptions::default()
        },
        SearchOptions {
            vector_k: Some(0),
            ..SearchOptions::default()
        },
        SearchOptions {
            weight_text: Some(f64::NAN),
            ..SearchOptions::default()
        },
    ] {
        let err = search_tenant(&registry, &config, acme, "rust", &opts)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidParameter { .. })
        ));
    }
}

#[tokio::test]
async fn test_deleted_documents_disappear() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let acme = config.tenant("acme").unwrap();
    let table = registry.get_table(acme).await.unwrap();

    assert_eq!(table.count_documents().await.unwrap(), 3);
    assert!(table.delete_document(1).await.unwrap());
    assert!(!table.delete_document(1).await.unwrap());
    assert_eq!(table.count_documents().await.unwrap(), 2);
    assert!(table.fetch_document(1).await.unwrap().is_none());

    let hits = search_tenant(
        &registry,
        &config,
        acme,
        "rust crates",
        &SearchOptions::default(),
    )
    .await
    .unwrap();
    assert!(hits.iter().all(|h| h.id != 1));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let (config, registry) = setup();
    seed(&config, &registry).await;
    let globex = config.tenant("globex").unwrap();

    let hits = search_tenant(
        &registry,
        &config,
        globex,
        "rust",
        &SearchOptions::default(),
    )
    .await
    .unwrap();
    assert!(hits.is_empty());
    assert_eq!(registry.table_count(), 2);
    assert_eq!(registry.embedder_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_across_tenants() {
    let (config, registry) = setup();
    let config = Arc::new(config);

    let mut handles = Vec::new();
    for i in 0..20 {
        let registry = Arc::clone(&registry);
        let config = Arc::clone(&config);
        handles.push(tokio::spawn(async move {
            let tenant = if i % 2 == 0 { "acme" } else { "globex" };
            let tenant = config.tenant(tenant).unwrap();
            insert_for_tenant(
                &registry,
                tenant,
                &format!("doc {i}"),
                "",
                "",
                format!("document {i} about docker"),
            )
            .await
            .unwrap()
        }));
    }

    let mut acme_ids = Vec::new();
    for handle in handles {
        let row = handle.await.unwrap();
        if row.project_id == 1 {
            acme_ids.push(row.id);
        }
    }
    acme_ids.sort_unstable();
    assert_eq!(acme_ids, (1..=10).collect::<Vec<i64>>());

    for name in ["acme", "globex"] {
        let table = registry
            .get_table(config.tenant(name).unwrap())
            .await
            .unwrap();
        assert_eq!(table.count_documents().await.unwrap(), 10);
    }
}
