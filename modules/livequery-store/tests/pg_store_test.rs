//! Integration tests for PgRecordStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use livequery_store::{PgRecordStore, RecordStore, UpdateOutcome};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

async fn test_store(table: &str) -> Option<PgRecordStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    let store = PgRecordStore::new(pool.clone(), table).ok()?;
    store.migrate().await.ok()?;

    sqlx::query(&format!("TRUNCATE {table}"))
        .execute(&pool)
        .await
        .ok()?;

    Some(store)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn put_get_and_overwrite() {
    let Some(store) = test_store("pg_test_put_get").await else {
        return;
    };

    store.put("a", json!({"v": 1})).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), Some(json!({"v": 1})));

    store.put("a", json!({"v": 2})).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), Some(json!({"v": 2})));
    assert_eq!(store.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn put_if_absent_does_not_clobber() {
    let Some(store) = test_store("pg_test_put_if_absent").await else {
        return;
    };

    assert!(store.put_if_absent("q", json!({"v": 1})).await.unwrap());
    assert!(!store.put_if_absent("q", json!({"v": 2})).await.unwrap());
    assert_eq!(store.get("q").await.unwrap(), Some(json!({"v": 1})));
}

#[tokio::test]
async fn update_merges_and_reports_missing() {
    let Some(store) = test_store("pg_test_update").await else {
        return;
    };

    store
        .put("q1", json!({"id": "q1", "question_text": "Price?", "status": "INITIATED"}))
        .await
        .unwrap();

    let outcome = store
        .update("q1", json!({"status": "READY", "answer": "$20"}))
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated);

    let record = store.get("q1").await.unwrap().unwrap();
    assert_eq!(record["question_text"], "Price?");
    assert_eq!(record["status"], "READY");
    assert_eq!(record["answer"], "$20");

    let outcome = store.update("ghost", json!({"status": "READY"})).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Missing);
    assert_eq!(store.get("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn update_unless_skips_guarded_records() {
    let Some(store) = test_store("pg_test_update_unless").await else {
        return;
    };

    store
        .put("q1", json!({"status": "CONSUMED", "answer": "$20"}))
        .await
        .unwrap();
    let patch = json!({"status": "READY", "answer": "late"});

    let outcome = store
        .update_unless("q1", patch.clone(), "status", "CONSUMED")
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Skipped);
    assert_eq!(store.get("q1").await.unwrap().unwrap()["status"], "CONSUMED");

    let outcome = store
        .update_unless("ghost", patch, "status", "CONSUMED")
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Missing);
}

#[tokio::test]
async fn find_by_filters_on_status() {
    let Some(store) = test_store("pg_test_find_by").await else {
        return;
    };

    store.put("a", json!({"status": "READY"})).await.unwrap();
    store.put("b", json!({"status": "INITIATED"})).await.unwrap();
    store.put("log", json!({"questions": ["x"]})).await.unwrap();

    let ready = store.find_by("status", "READY").await.unwrap();
    assert_eq!(ready, vec![json!({"status": "READY"})]);
    assert_eq!(store.scan().await.unwrap().len(), 3);
}
