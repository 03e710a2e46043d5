//! JSON-file backed state store
//!
//! [`FileStateStore`] keeps records in memory and rewrites a single JSON file
//! after every mutation, so success markers survive process restarts. It is
//! meant for local runs of the CLI, not for concurrent writers across
//! processes.
//!
//! The file holds a JSON array of records:
//!
//! ```text
//! [
//!   { "unit": "seed", "tenant": "acme", "payload": "true", "updated_at": "..." }
//! ]
//! ```

use crate::{
    error::{Result, StateError},
    record::{StateKey, StateRecord},
    traits::StateStore,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State store persisted to a JSON file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    records: Arc<RwLock<HashMap<StateKey, StateRecord>>>,
}

impl FileStateStore {
    /// Open a store at `path`, loading existing records
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => {
                let list: Vec<StateRecord> = serde_json::from_slice(&bytes)?;
                list.into_iter()
                    .map(|record| (record.key.clone(), record))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StateError::Io(e)),
        };

        debug!(path = %path.display(), records = records.len(), "opened state file");

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, records: &HashMap<StateKey, StateRecord>) -> Result<()> {
        let mut list: Vec<&StateRecord> = records.values().collect();
        list.sort_by(|a, b| a.key.cmp(&b.key));
        let json = serde_json::to_vec_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // replace via rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &StateKey) -> Result<Option<StateRecord>> {
        key.validate()?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: StateRecord) -> Result<()> {
        record.key.validate()?;
        let mut records = self.records.write().await;
        // memory only changes once the file write succeeded
        let mut next = records.clone();
        next.insert(record.key.clone(), record);
        self.flush(&next).await?;
        *records = next;
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool> {
        let mut records = self.records.write().await;
        if !records.contains_key(key) {
            return Ok(false);
        }
        let mut next = records.clone();
        next.remove(key);
        self.flush(&next).await?;
        *records = next;
        Ok(true)
    }

    async fn list_tenant(&self, tenant: &str) -> Result<Vec<StateRecord>> {
        let records = self.records.read().await;
        let mut list: Vec<StateRecord> = records
            .values()
            .filter(|record| record.key.tenant == tenant)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.key.unit.cmp(&b.key.unit));
        Ok(list)
    }
}
