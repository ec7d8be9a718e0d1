//! Document store port.
//!
//! Models the handful of primitives the dashboard needs from a managed
//! key-value/document database: point reads and writes on a
//! `(partition key, sort key)` pair, a conditional create, a field merge,
//! ordered range queries inside one partition, a single secondary index and
//! filtered scans. Items are plain JSON objects; the key attributes live in the
//! item itself under the names below.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Partition key attribute.
pub const PK: &str = "pk";
/// Sort key attribute.
pub const SK: &str = "sk";
/// Secondary index partition key attribute.
pub const GSI1_PK: &str = "gsi1pk";
/// Secondary index sort key attribute.
pub const GSI1_SK: &str = "gsi1sk";
/// Expiry attribute, seconds since the epoch.
pub const TTL: &str = "ttl";

pub type Item = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("conditional check failed for {pk}/{sk}")]
    ConditionFailed { pk: String, sk: String },

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Condition on the sort key of a partition query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    /// Inclusive on both ends.
    Between(String, String),
    BeginsWith(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sk: &str) -> bool {
        match self {
            SortKeyCondition::Between(lo, hi) => sk >= lo.as_str() && sk <= hi.as_str(),
            SortKeyCondition::BeginsWith(prefix) => sk.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyQuery {
    pub pk: String,
    pub sk: SortKeyCondition,
    pub descending: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    SortKeyEquals(String),
    PartitionKeyPrefix(String),
}

impl ScanFilter {
    pub fn matches(&self, pk: &str, sk: &str) -> bool {
        match self {
            ScanFilter::SortKeyEquals(expected) => sk == expected,
            ScanFilter::PartitionKeyPrefix(prefix) => pk.starts_with(prefix.as_str()),
        }
    }
}

/// Storage backend used by the data access layer.
///
/// Implementations must hide items whose [`TTL`] attribute is in the past.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Unconditional write; replaces any item with the same keys.
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// Write only if no item with the same keys exists, otherwise
    /// [`StoreError::ConditionFailed`].
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError>;

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError>;

    /// Merge `fields` into an existing item and return the full result, or
    /// `None` if the item does not exist.
    async fn update(&self, pk: &str, sk: &str, fields: Item) -> Result<Option<Item>, StoreError>;

    /// Idempotent delete.
    async fn delete(&self, pk: &str, sk: &str) -> Result<(), StoreError>;

    /// Items of one partition, ordered by sort key.
    async fn query(&self, query: KeyQuery) -> Result<Vec<Item>, StoreError>;

    /// Items whose secondary partition key equals `gsi1pk`, newest
    /// secondary sort key first.
    async fn query_index(&self, gsi1pk: &str, limit: Option<usize>)
        -> Result<Vec<Item>, StoreError>;

    /// Every item matching `filter`, in no particular order.
    async fn scan(&self, filter: ScanFilter) -> Result<Vec<Item>, StoreError>;
}

/// Read a string attribute that a stored item must carry.
pub(crate) fn key_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str, StoreError> {
    item.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidItem(format!("missing string attribute '{name}'")))
}

pub(crate) fn optional_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(Value::as_str)
}

pub(crate) fn expires_at(item: &Item) -> Option<i64> {
    item.get(TTL).and_then(Value::as_i64)
}

pub(crate) fn is_expired(item: &Item, now_secs: i64) -> bool {
    expires_at(item).is_some_and(|ttl| ttl <= now_secs)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_key_conditions() {
        // ---
        let between = SortKeyCondition::Between("DATA#2025-01-01".into(), "DATA#2025-01-02".into());
        assert!(between.matches("DATA#2025-01-01"));
        assert!(between.matches("DATA#2025-01-01T12:00:00.000Z"));
        assert!(!between.matches("DATA#2025-01-02T00:00:00.000Z"));
        assert!(!between.matches("CONFIG"));

        let prefix = SortKeyCondition::BeginsWith("DATA#".into());
        assert!(prefix.matches("DATA#x"));
        assert!(!prefix.matches("CONFIG"));
    }

    #[test]
    fn test_scan_filters() {
        // ---
        assert!(ScanFilter::SortKeyEquals("CONFIG".into()).matches("SENSOR#a", "CONFIG"));
        assert!(!ScanFilter::SortKeyEquals("CONFIG".into()).matches("SENSOR#a", "DATA#1"));
        assert!(ScanFilter::PartitionKeyPrefix("ALERT#".into()).matches("ALERT#1", "ALERT#t"));
        assert!(!ScanFilter::PartitionKeyPrefix("ALERT#".into()).matches("SENSOR#1", "CONFIG"));
    }

    #[test]
    fn test_expiry_detection() {
        // ---
        let item: Item = json!({ "pk": "a", "sk": "b", "ttl": 100 })
            .as_object()
            .cloned()
            .unwrap();
        assert!(is_expired(&item, 100));
        assert!(!is_expired(&item, 99));

        let no_ttl: Item = json!({ "pk": "a", "sk": "b" }).as_object().cloned().unwrap();
        assert!(!is_expired(&no_ttl, i64::MAX));
        assert_eq!(key_attr(&no_ttl, PK).unwrap(), "a");
        assert!(key_attr(&no_ttl, GSI1_PK).is_err());
    }
}
