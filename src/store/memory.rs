//! In-process [`DocumentStore`] backed by an ordered map.
//!
//! Used when no database is configured and by the test suites. Keys are kept
//! in a `BTreeMap` so partition queries come out in sort-key order for free.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    is_expired, key_attr, optional_attr, DocumentStore, Item, KeyQuery, ScanFilter, StoreError,
    GSI1_PK, GSI1_SK, PK, SK,
};

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<(String, String), Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items, expired ones included.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

fn keys_of(item: &Item) -> Result<(String, String), StoreError> {
    Ok((key_attr(item, PK)?.to_string(), key_attr(item, SK)?.to_string()))
}

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let key = keys_of(&item)?;
        self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        // ---
        let key = keys_of(&item)?;
        let now = now_secs();
        let mut items = self.items.write().await;
        if items.get(&key).is_some_and(|existing| !is_expired(existing, now)) {
            return Err(StoreError::ConditionFailed {
                pk: key.0,
                sk: key.1,
            });
        }
        items.insert(key, item);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let now = now_secs();
        let items = self.items.read().await;
        Ok(items
            .get(&(pk.to_string(), sk.to_string()))
            .filter(|item| !is_expired(item, now))
            .cloned())
    }

    async fn update(&self, pk: &str, sk: &str, fields: Item) -> Result<Option<Item>, StoreError> {
        // ---
        let now = now_secs();
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(&(pk.to_string(), sk.to_string())) else {
            return Ok(None);
        };
        if is_expired(item, now) {
            return Ok(None);
        }
        for (name, value) in fields {
            if name == PK || name == SK {
                continue;
            }
            item.insert(name, value);
        }
        Ok(Some(item.clone()))
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<(), StoreError> {
        self.items
            .write()
            .await
            .remove(&(pk.to_string(), sk.to_string()));
        Ok(())
    }

    async fn query(&self, query: KeyQuery) -> Result<Vec<Item>, StoreError> {
        // ---
        let now = now_secs();
        let items = self.items.read().await;
        let partition = items
            .range((query.pk.clone(), String::new())..)
            .take_while(|((pk, _), _)| *pk == query.pk)
            .filter(|((_, sk), item)| query.sk.matches(sk) && !is_expired(item, now))
            .map(|(_, item)| item.clone());

        let limit = query.limit.unwrap_or(usize::MAX);
        let found: Vec<Item> = if query.descending {
            partition.collect::<Vec<_>>().into_iter().rev().take(limit).collect()
        } else {
            partition.take(limit).collect()
        };
        Ok(found)
    }

    async fn query_index(
        &self,
        gsi1pk: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Item>, StoreError> {
        // ---
        let now = now_secs();
        let items = self.items.read().await;
        let mut found: Vec<Item> = items
            .values()
            .filter(|item| optional_attr(item, GSI1_PK) == Some(gsi1pk))
            .filter(|item| !is_expired(item, now))
            .cloned()
            .collect();
        found.sort_by(|a, b| optional_attr(b, GSI1_SK).cmp(&optional_attr(a, GSI1_SK)));
        found.truncate(limit.unwrap_or(usize::MAX));
        Ok(found)
    }

    async fn scan(&self, filter: ScanFilter) -> Result<Vec<Item>, StoreError> {
        let now = now_secs();
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|((pk, sk), item)| filter.matches(pk, sk) && !is_expired(item, now))
            .map(|(_, item)| item.clone())
            .collect())
    }
}
