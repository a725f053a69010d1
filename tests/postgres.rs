//! PostgreSQL integration suite.
//!
//! Runs only when `VECTORLAB_TEST_DATABASE_URL` points at a database with the
//! `vector` extension available; every test returns early otherwise.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::postgres::{PgPool, PgPoolOptions};
use vectorlab::pg_table::PgTable;
use vectorlab_core::models::{HybridQuery, NewDocument};
use vectorlab_core::table::TenantTable;
use vectorlab_core::{StoreError, TableName};

const DB_ENV: &str = "VECTORLAB_TEST_DATABASE_URL";

async fn pool() -> Option<PgPool> {
    let url = std::env::var(DB_ENV).ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    Some(pool)
}

fn unique_table(prefix: &str) -> TableName {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    TableName::parse(&format!("{prefix}_{}_{nanos}", std::process::id())).unwrap()
}

async fn index_count(pool: &PgPool, table: &TableName) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = current_schema() AND tablename = $1",
    )
    .bind(table.as_str())
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn drop_table(pool: &PgPool, table: &TableName) {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(pool)
        .await
        .unwrap();
}

fn doc(title: &str, content: &str, embedding: Vec<f32>) -> NewDocument {
    NewDocument {
        content: content.to_string(),
        title: title.to_string(),
        url: format!("https://example.com/{title}"),
        published_at: "2024-01-01".to_string(),
        embedding,
    }
}

#[tokio::test]
async fn test_provision_insert_search_delete() {
    let Some(pool) = pool().await else {
        return;
    };
    let name = unique_table("vlab_it");
    let table = PgTable::new(pool.clone(), name.clone(), 7, 3).with_lists(1);

    let err = table.count_documents().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotInitialized(_))
    ));

    table.provision().await.unwrap();
    table.provision().await.unwrap();
    assert!(table.is_ready());

    // A second handle re-runs the DDL against the existing table.
    PgTable::new(pool.clone(), name.clone(), 7, 3)
        .with_lists(1)
        .provision()
        .await
        .unwrap();
    // Primary key plus project, text and embedding indexes.
    assert_eq!(index_count(&pool, &name).await, 4);

    let alpha = table
        .insert_document(&doc("alpha", "rust cargo crates", vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();
    let beta = table
        .insert_document(&doc("beta", "python notebooks", vec![0.0, 1.0, 0.0]))
        .await
        .unwrap();
    assert_eq!(alpha.project_id, 7);
    assert!(beta.id > alpha.id);
    assert_eq!(table.count_documents().await.unwrap(), 2);

    let fetched = table.fetch_document(alpha.id).await.unwrap().unwrap();
    assert_eq!(fetched, alpha);

    let err = table
        .insert_document(&doc("bad", "x", vec![1.0, 0.0]))
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::DimensionMismatch {
            expected: 3,
            got: 2
        })
    );
    assert_eq!(table.count_documents().await.unwrap(), 2);

    let hits = table
        .hybrid_search(&HybridQuery::new(vec![1.0, 0.0, 0.0]).with_text("rust"))
        .await
        .unwrap();
    assert_eq!(hits[0].id, alpha.id);
    assert!(hits[0].text_score > 0.0);
    assert!((hits[0].vector_score - 1.0).abs() < 1e-6);

    let err = table
        .hybrid_search(&HybridQuery::new(vec![1.0, 0.0, 0.0]).with_limits(-1, 50))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::InvalidParameter { name: "top_k", .. })
    ));

    let vector = table
        .debug_vector_matches(&[0.0, 1.0, 0.0], 5)
        .await
        .unwrap();
    assert_eq!(vector[0].id, beta.id);
    assert!(table.debug_text_matches("", 5).await.unwrap().is_empty());
    let text = table.debug_text_matches("python", 5).await.unwrap();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].id, beta.id);

    assert!(table.delete_document(alpha.id).await.unwrap());
    assert!(!table.delete_document(alpha.id).await.unwrap());
    assert!(table.fetch_document(alpha.id).await.unwrap().is_none());
    assert_eq!(table.count_documents().await.unwrap(), 1);

    drop_table(&pool, &name).await;
}

#[tokio::test]
async fn test_existing_table_width_is_checked() {
    let Some(pool) = pool().await else {
        return;
    };
    let name = unique_table("vlab_width");

    PgTable::new(pool.clone(), name.clone(), 1, 3)
        .with_lists(1)
        .provision()
        .await
        .unwrap();

    let wider = PgTable::new(pool.clone(), name.clone(), 1, 4).with_lists(1);
    let err = wider.provision().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::DimensionMismatch {
            expected: 4,
            got: 3
        })
    );
    assert!(!wider.is_ready());

    drop_table(&pool, &name).await;
}

#[tokio::test]
async fn test_concurrent_inserts_serialize() {
    let Some(pool) = pool().await else {
        return;
    };
    let name = unique_table("vlab_conc");
    let table = Arc::new(PgTable::new(pool.clone(), name.clone(), 1, 3).with_lists(1));
    table.provision().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let table = Arc::clone(&table);
        handles.push(tokio::spawn(async move {
            table
                .insert_document(&doc(&format!("d{i}"), "docker", vec![0.0, 0.0, 1.0]))
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(table.count_documents().await.unwrap(), 10);

    drop_table(&pool, &name).await;
}
