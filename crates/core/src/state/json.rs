//! # JSON File Store
//!
//! Project records kept as a pretty-printed array in `.orchestrai/projects.json`.
//! Suitable for single-process use; every write rewrites the whole file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::record::{ProjectRecord, RecordPatch};
use super::store::ProjectStore;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<ProjectRecord>> {
        if fs::metadata(&self.path).await.is_err() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).with_context(|| format!("Corrupt store: {:?}", self.path))
    }

    async fn write_all(&self, records: &[ProjectRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write file: {:?}", self.path))
    }
}

#[async_trait]
impl ProjectStore for JsonFileStore {
    async fn load_by_thread_id(&self, thread_id: &str) -> Result<Option<ProjectRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|r| r.thread_id == thread_id))
    }

    async fn upsert(&self, thread_id: &str, patch: RecordPatch) -> Result<ProjectRecord> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;

        let record = match records.iter().position(|r| r.thread_id == thread_id) {
            Some(index) => {
                let existing = records.remove(index);
                let record = ProjectRecord::upserted(Some(existing), thread_id, patch);
                records.insert(index, record.clone());
                record
            }
            None => {
                let record = ProjectRecord::upserted(None, thread_id, patch);
                records.push(record.clone());
                record
            }
        };

        self.write_all(&records).await?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        let before = records.len();
        records.retain(|r| r.thread_id != thread_id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records).await?;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}
