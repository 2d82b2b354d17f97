//! # Project Store
//!
//! One storage interface for project records. The backend is picked once at
//! startup from [`Settings::storage`](crate::config::Settings).

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::db::SqliteProjectStore;
use super::json::JsonFileStore;
use super::record::{ProjectRecord, RecordPatch};
use crate::config::{Settings, StorageBackend};

/// Durable key-value store of project records keyed by thread id
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load_by_thread_id(&self, thread_id: &str) -> Result<Option<ProjectRecord>>;

    /// Create the record when absent, otherwise overwrite the patched fields
    async fn upsert(&self, thread_id: &str, patch: RecordPatch) -> Result<ProjectRecord>;

    /// All records, most recently updated first
    async fn list(&self) -> Result<Vec<ProjectRecord>>;

    /// Returns whether a record was removed
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// Open the configured backend under the runtime directory
pub fn open_store(settings: &Settings) -> Result<Arc<dyn ProjectStore>> {
    let store: Arc<dyn ProjectStore> = match settings.storage {
        StorageBackend::Sqlite => Arc::new(SqliteProjectStore::open_at(
            settings.runtime_dir.join("orchestrai.db"),
        )?),
        StorageBackend::Json => Arc::new(JsonFileStore::new(
            settings.runtime_dir.join("projects.json"),
        )),
    };
    tracing::info!(backend = store.backend(), dir = ?settings.runtime_dir, "Project store ready");
    Ok(store)
}

/// Process-local store, used in tests
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ProjectRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn load_by_thread_id(&self, thread_id: &str) -> Result<Option<ProjectRecord>> {
        Ok(self.records.lock().await.get(thread_id).cloned())
    }

    async fn upsert(&self, thread_id: &str, patch: RecordPatch) -> Result<ProjectRecord> {
        let mut records = self.records.lock().await;
        let record = ProjectRecord::upserted(records.remove(thread_id), thread_id, patch);
        records.insert(thread_id.to_string(), record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let mut all: Vec<_> = self.records.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.records.lock().await.remove(thread_id).is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
