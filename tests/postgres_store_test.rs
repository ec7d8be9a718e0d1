//! `PgStore` against a real Postgres (`DATABASE_URL`). Ignored by default;
//! run with `cargo test -- --ignored` once a database is reachable.
//!
//! Each test works in its own throwaway table and drops it afterwards.

use anyhow::Result;
use iot_dashboard::{
    schema,
    store::{Item, KeyQuery, ScanFilter, SortKeyCondition, TTL},
    DocumentStore, PgStore, StoreError,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;

fn item(value: Value) -> Item {
    value.as_object().cloned().unwrap()
}

/// Connect and create a fresh table, or `None` when no database is configured.
async fn fresh_store() -> Result<Option<(PgStore, String)>> {
    // ---
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    let table = format!("test_items_{}", uuid::Uuid::new_v4().simple());
    schema::create_schema(&pool, &table).await?;
    Ok(Some((PgStore::new(pool, table.clone()), table)))
}

async fn drop_table(store: &PgStore, table: &str) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(store.pool())
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn put_if_absent_refuses_existing_key() -> Result<()> {
    // ---
    let Some((store, table)) = fresh_store().await? else { return Ok(()) };

    store
        .put_if_absent(item(json!({ "pk": "SENSOR#a", "sk": "CONFIG", "name": "first" })))
        .await?;
    let second = store
        .put_if_absent(item(json!({ "pk": "SENSOR#a", "sk": "CONFIG", "name": "second" })))
        .await;
    assert!(matches!(second, Err(StoreError::ConditionFailed { .. })));

    let stored = store.get("SENSOR#a", "CONFIG").await?.unwrap();
    assert_eq!(stored["name"], "first");

    drop_table(&store, &table).await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn update_merges_and_reports_missing() -> Result<()> {
    // ---
    let Some((store, table)) = fresh_store().await? else { return Ok(()) };

    store.put(item(json!({ "pk": "p", "sk": "s", "a": 1, "b": 2 }))).await?;

    let merged = store
        .update("p", "s", item(json!({ "b": 3, "c": 4, "pk": "other" })))
        .await?
        .unwrap();
    assert_eq!(merged["a"], 1);
    assert_eq!(merged["b"], 3);
    assert_eq!(merged["c"], 4);
    assert_eq!(merged["pk"], "p");

    let missing = store.update("p", "nope", item(json!({ "b": 3 }))).await?;
    assert!(missing.is_none());
    assert!(store.get("p", "nope").await?.is_none());

    drop_table(&store, &table).await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn query_orders_and_limits_within_partition() -> Result<()> {
    // ---
    let Some((store, table)) = fresh_store().await? else { return Ok(()) };

    for sk in ["DATA#3", "DATA#1", "DATA#2", "CONFIG"] {
        store.put(item(json!({ "pk": "SENSOR#a", "sk": sk }))).await?;
    }
    store.put(item(json!({ "pk": "SENSOR#b", "sk": "DATA#9" }))).await?;

    let ascending = store
        .query(KeyQuery {
            pk: "SENSOR#a".into(),
            sk: SortKeyCondition::BeginsWith("DATA#".into()),
            descending: false,
            limit: None,
        })
        .await?;
    let sks: Vec<_> = ascending.iter().map(|i| i["sk"].clone()).collect();
    assert_eq!(sks, vec![json!("DATA#1"), json!("DATA#2"), json!("DATA#3")]);

    let window = store
        .query(KeyQuery {
            pk: "SENSOR#a".into(),
            sk: SortKeyCondition::Between("DATA#2".into(), "DATA#3".into()),
            descending: false,
            limit: None,
        })
        .await?;
    let sks: Vec<_> = window.iter().map(|i| i["sk"].clone()).collect();
    assert_eq!(sks, vec![json!("DATA#2"), json!("DATA#3")]);

    let latest = store
        .query(KeyQuery {
            pk: "SENSOR#a".into(),
            sk: SortKeyCondition::BeginsWith("DATA#".into()),
            descending: true,
            limit: Some(1),
        })
        .await?;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0]["sk"], "DATA#3");

    drop_table(&store, &table).await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn index_query_is_newest_first() -> Result<()> {
    // ---
    let Some((store, table)) = fresh_store().await? else { return Ok(()) };

    for (id, ts) in [("1", "ALERT#2025-01-01"), ("2", "ALERT#2025-01-03"), ("3", "ALERT#2025-01-02")] {
        store
            .put(item(json!({
                "pk": format!("ALERT#{id}"),
                "sk": ts,
                "gsi1pk": "SENSOR#a",
                "gsi1sk": ts,
            })))
            .await?;
    }

    let found = store.query_index("SENSOR#a", Some(2)).await?;
    let pks: Vec<_> = found.iter().map(|i| i["pk"].clone()).collect();
    assert_eq!(pks, vec![json!("ALERT#2"), json!("ALERT#3")]);
    assert!(store.query_index("SENSOR#z", None).await?.is_empty());

    drop_table(&store, &table).await
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn expired_items_are_invisible_and_purged() -> Result<()> {
    // ---
    let Some((store, table)) = fresh_store().await? else { return Ok(()) };

    store.put(item(json!({ "pk": "p", "sk": "old", TTL: 1 }))).await?;
    store.put(item(json!({ "pk": "p", "sk": "new", TTL: i64::MAX }))).await?;

    assert!(store.get("p", "old").await?.is_none());
    assert!(store.get("p", "new").await?.is_some());

    let all = store.scan(ScanFilter::PartitionKeyPrefix("p".into())).await?;
    assert_eq!(all.len(), 1);

    let in_partition = store
        .query(KeyQuery {
            pk: "p".into(),
            sk: SortKeyCondition::BeginsWith("".into()),
            descending: false,
            limit: None,
        })
        .await?;
    assert_eq!(in_partition.len(), 1);
    assert!(store.update("p", "old", item(json!({ "x": 1 }))).await?.is_none());

    // An expired row does not block a conditional write on its key.
    store
        .put_if_absent(item(json!({ "pk": "p", "sk": "old", "fresh": true })))
        .await?;
    assert_eq!(store.get("p", "old").await?.unwrap()["fresh"], true);

    store.put(item(json!({ "pk": "q", "sk": "gone", TTL: 1 }))).await?;
    assert_eq!(store.purge_expired().await?, 1);

    drop_table(&store, &table).await
}
