//! [`DocumentStore`] on top of a single Postgres table.
//!
//! Every item is stored whole in a `JSONB` column; the key attributes are
//! copied into their own columns so lookups, range queries and the secondary
//! index use ordinary b-tree indexes. See [`crate::schema`] for the DDL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{types::Json, PgPool, Row};

use super::{
    expires_at, key_attr, optional_attr, DocumentStore, Item, KeyQuery, ScanFilter,
    SortKeyCondition, StoreError, GSI1_PK, GSI1_SK, PK, SK,
};

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    /// `table` must already have been validated as a plain SQL identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Physically remove expired rows. Reads already hide them.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= $1",
            self.table
        );
        let done = sqlx::query(&sql)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

fn rows_to_items(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Item>, StoreError> {
    rows.into_iter()
        .map(|row| {
            row.try_get::<Json<Item>, _>("item")
                .map(|Json(item)| item)
                .map_err(StoreError::from)
        })
        .collect()
}

fn sql_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        // ---
        let sql = format!(
            r#"
            INSERT INTO {} (pk, sk, gsi1pk, gsi1sk, expires_at, item)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (pk, sk) DO UPDATE SET
                gsi1pk     = EXCLUDED.gsi1pk,
                gsi1sk     = EXCLUDED.gsi1sk,
                expires_at = EXCLUDED.expires_at,
                item       = EXCLUDED.item
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(key_attr(&item, PK)?)
            .bind(key_attr(&item, SK)?)
            .bind(optional_attr(&item, GSI1_PK))
            .bind(optional_attr(&item, GSI1_SK))
            .bind(expires_at(&item))
            .bind(Json(&item))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        // ---
        let pk = key_attr(&item, PK)?;
        let sk = key_attr(&item, SK)?;

        // An expired row still occupies the key until purged; let the new
        // item take its place.
        let sql = format!(
            r#"
            INSERT INTO {table} (pk, sk, gsi1pk, gsi1sk, expires_at, item)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (pk, sk) DO UPDATE SET
                gsi1pk     = EXCLUDED.gsi1pk,
                gsi1sk     = EXCLUDED.gsi1sk,
                expires_at = EXCLUDED.expires_at,
                item       = EXCLUDED.item
            WHERE {table}.expires_at IS NOT NULL AND {table}.expires_at <= $7
            "#,
            table = self.table
        );
        let done = sqlx::query(&sql)
            .bind(pk)
            .bind(sk)
            .bind(optional_attr(&item, GSI1_PK))
            .bind(optional_attr(&item, GSI1_SK))
            .bind(expires_at(&item))
            .bind(Json(&item))
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed {
                pk: pk.to_string(),
                sk: sk.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let sql = format!(
            "SELECT item FROM {} WHERE pk = $1 AND sk = $2 \
             AND (expires_at IS NULL OR expires_at > $3)",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(pk)
            .bind(sk)
            .bind(Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await?;
        Ok(rows_to_items(row.into_iter().collect())?.pop())
    }

    async fn update(&self, pk: &str, sk: &str, fields: Item) -> Result<Option<Item>, StoreError> {
        // ---
        let mut fields = fields;
        fields.remove(PK);
        fields.remove(SK);

        let sql = format!(
            "UPDATE {} SET item = item || $3 WHERE pk = $1 AND sk = $2 \
             AND (expires_at IS NULL OR expires_at > $4) RETURNING item",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(pk)
            .bind(sk)
            .bind(Json(&fields))
            .bind(Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await?;
        Ok(rows_to_items(row.into_iter().collect())?.pop())
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE pk = $1 AND sk = $2", self.table);
        sqlx::query(&sql).bind(pk).bind(sk).execute(&self.pool).await?;
        Ok(())
    }

    async fn query(&self, query: KeyQuery) -> Result<Vec<Item>, StoreError> {
        // ---
        let order = if query.descending { "DESC" } else { "ASC" };
        let now = Utc::now().timestamp();

        let rows = match &query.sk {
            SortKeyCondition::Between(lo, hi) => {
                let sql = format!(
                    "SELECT item FROM {} WHERE pk = $1 AND sk BETWEEN $2 AND $3 \
                     AND (expires_at IS NULL OR expires_at > $4) ORDER BY sk {order} LIMIT $5",
                    self.table
                );
                sqlx::query(&sql)
                    .bind(&query.pk)
                    .bind(lo)
                    .bind(hi)
                    .bind(now)
                    .bind(sql_limit(query.limit))
                    .fetch_all(&self.pool)
                    .await?
            }
            SortKeyCondition::BeginsWith(prefix) => {
                let sql = format!(
                    "SELECT item FROM {} WHERE pk = $1 AND starts_with(sk, $2) \
                     AND (expires_at IS NULL OR expires_at > $3) ORDER BY sk {order} LIMIT $4",
                    self.table
                );
                sqlx::query(&sql)
                    .bind(&query.pk)
                    .bind(prefix)
                    .bind(now)
                    .bind(sql_limit(query.limit))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows_to_items(rows)
    }

    async fn query_index(
        &self,
        gsi1pk: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Item>, StoreError> {
        let sql = format!(
            "SELECT item FROM {} WHERE gsi1pk = $1 \
             AND (expires_at IS NULL OR expires_at > $2) ORDER BY gsi1sk DESC LIMIT $3",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(gsi1pk)
            .bind(Utc::now().timestamp())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        rows_to_items(rows)
    }

    async fn scan(&self, filter: ScanFilter) -> Result<Vec<Item>, StoreError> {
        // ---
        let (predicate, value) = match &filter {
            ScanFilter::SortKeyEquals(sk) => ("sk = $1", sk),
            ScanFilter::PartitionKeyPrefix(prefix) => ("starts_with(pk, $1)", prefix),
        };
        let sql = format!(
            "SELECT item FROM {} WHERE {predicate} AND (expires_at IS NULL OR expires_at > $2)",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(value)
            .bind(Utc::now().timestamp())
            .fetch_all(&self.pool)
            .await?;
        rows_to_items(rows)
    }
}
