//! Extensible state store trait
//!
//! [`StateStore`] is the key-value abstraction the orchestration layer reads
//! success markers from. Implement it to back markers with any database; the
//! workspace ships [`InMemoryStateStore`](crate::InMemoryStateStore) and
//! [`FileStateStore`](crate::FileStateStore).
//!
//! # Contract
//!
//! - `get` returns `Ok(None)` for a key that was never written. A missing
//!   record is a normal outcome, not an error.
//! - `put` overwrites any existing record with the same key.
//! - Implementations must be safe to share across tasks (`Send + Sync`).
//!
//! # Implementing a Backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use singlerun_state::{StateKey, StateRecord, StateStore, Result};
//!
//! pub struct TableStore {
//!     client: TableClient,
//!     table: String,
//! }
//!
//! #[async_trait]
//! impl StateStore for TableStore {
//!     async fn get(&self, key: &StateKey) -> Result<Option<StateRecord>> {
//!         let item = self.client.get_item(&self.table, &key.unit, &key.tenant).await?;
//!         Ok(item.map(into_record))
//!     }
//!
//!     async fn put(&self, record: StateRecord) -> Result<()> {
//!         self.client.put_item(&self.table, from_record(record)).await?;
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &StateKey) -> Result<bool> {
//!         Ok(self.client.delete_item(&self.table, &key.unit, &key.tenant).await?)
//!     }
//!
//!     async fn list_tenant(&self, tenant: &str) -> Result<Vec<StateRecord>> {
//!         // query a secondary index on tenant
//!         todo!()
//!     }
//! }
//! ```

use crate::error::Result;
use crate::record::{StateKey, StateRecord};
use async_trait::async_trait;

/// Key-value store holding state records
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the record for a key, `None` if it was never written
    async fn get(&self, key: &StateKey) -> Result<Option<StateRecord>>;

    /// Insert or overwrite a record
    async fn put(&self, record: StateRecord) -> Result<()>;

    /// Remove a record, returning whether one existed
    ///
    /// The orchestration layer never calls this. It exists for operators
    /// who need to force a unit to run again.
    async fn delete(&self, key: &StateKey) -> Result<bool>;

    /// All records for a tenant, ordered by unit name
    async fn list_tenant(&self, tenant: &str) -> Result<Vec<StateRecord>>;

    /// Whether the unit has a success marker for the tenant
    async fn has_succeeded(&self, key: &StateKey) -> Result<bool> {
        Ok(self
            .get(key)
            .await?
            .map(|record| record.is_success())
            .unwrap_or(false))
    }
}
