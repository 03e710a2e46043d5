//! In-memory state store for development and testing
//!
//! [`InMemoryStateStore`] keeps every record in an `Arc<RwLock<HashMap>>`.
//! Clones share the same storage, so a store handed to an engine can still be
//! inspected by the test that created it.

use crate::{
    error::Result,
    record::{StateKey, StateRecord},
    traits::StateStore,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type RecordStorage = Arc<RwLock<HashMap<StateKey, StateRecord>>>;

/// Thread-safe in-memory state store
///
/// # Example
///
/// ```rust
/// use singlerun_state::{InMemoryStateStore, StateKey, StateRecord, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStateStore::new();
///     let key = StateKey::new("seed", "acme");
///
///     assert!(!store.has_succeeded(&key).await?);
///     store.put(StateRecord::succeeded(key.clone())).await?;
///     assert!(store.has_succeeded(&key).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    storage: RecordStorage,
}

impl InMemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = StateRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        Self {
            storage: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of records across all tenants
    pub async fn record_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Remove every record (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &StateKey) -> Result<Option<StateRecord>> {
        key.validate()?;
        Ok(self.storage.read().await.get(key).cloned())
    }

    async fn put(&self, record: StateRecord) -> Result<()> {
        record.key.validate()?;
        self.storage
            .write()
            .await
            .insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool> {
        Ok(self.storage.write().await.remove(key).is_some())
    }

    async fn list_tenant(&self, tenant: &str) -> Result<Vec<StateRecord>> {
        let storage = self.storage.read().await;
        let mut records: Vec<StateRecord> = storage
            .values()
            .filter(|record| record.key.tenant == tenant)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key.unit.cmp(&b.key.unit));
        Ok(records)
    }
}
