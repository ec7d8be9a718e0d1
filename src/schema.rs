//! Database schema management for the Postgres document store.
//!
//! Ensures the single items table and its indexes exist before serving
//! requests. Applied once on startup from `main.rs` (EMBP: single gateway call).

use sqlx::PgPool;

// ---

/// Create the items table and its indexes (idempotent).
///
/// One row per stored item: the primary key mirrors the `(pk, sk)` pair, the
/// `gsi1` index serves per-sensor alert lookups and `expires_at` carries the
/// reading retention deadline. Safe to call on every startup.
///
/// `table` must be a validated identifier (see [`crate::config::is_valid_table_name`]).
pub async fn create_schema(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            pk          TEXT   NOT NULL,
            sk          TEXT   NOT NULL,
            gsi1pk      TEXT,
            gsi1sk      TEXT,
            expires_at  BIGINT,
            item        JSONB  NOT NULL,
            PRIMARY KEY (pk, sk)
        );
        "#
    ))
    .execute(&mut *tx)
    .await?;

    // Secondary index: alerts by sensor, newest first
    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table}_gsi1
            ON {table} (gsi1pk, gsi1sk)
            WHERE gsi1pk IS NOT NULL;
        "#
    ))
    .execute(&mut *tx)
    .await?;

    // Scans filter on sort key equality (all sensor configs)
    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table}_sk
            ON {table} (sk);
        "#
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table}_expires_at
            ON {table} (expires_at)
            WHERE expires_at IS NOT NULL;
        "#
    ))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
