//! # SQLite Project Store
//!
//! Project records in `.orchestrai/orchestrai.db`. The full record is kept as
//! a JSON document next to the columns used for lookups and ordering.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::record::{ProjectRecord, RecordPatch};
use super::store::ProjectStore;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

pub struct SqliteProjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProjectStore {
    /// Open or create the database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref()).context("Failed to open project database")?;
        Self::with_connection(conn)
    }

    /// Database that lives only as long as the store
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    thread_id TEXT PRIMARY KEY,
                    prompt TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'running',
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_projects_updated ON projects(updated_at)",
                [],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    fn load_sync(conn: &Connection, thread_id: &str) -> Result<Option<ProjectRecord>> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM projects WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load project")?;

        data.map(|d| serde_json::from_str(&d).context("Corrupt project record"))
            .transpose()
    }
}

#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn load_by_thread_id(&self, thread_id: &str) -> Result<Option<ProjectRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Self::load_sync(&conn, thread_id)
    }

    async fn upsert(&self, thread_id: &str, patch: RecordPatch) -> Result<ProjectRecord> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let existing = Self::load_sync(&conn, thread_id)?;
        let record = ProjectRecord::upserted(existing, thread_id, patch);

        conn.execute(
            r#"
            INSERT INTO projects (thread_id, prompt, status, data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(thread_id) DO UPDATE SET
                prompt = excluded.prompt,
                status = excluded.status,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
            params![
                record.thread_id,
                record.prompt,
                record.status.as_str(),
                serde_json::to_string(&record)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to save project")?;

        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare("SELECT data FROM projects ORDER BY updated_at DESC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list projects")?;

        rows.iter()
            .map(|d| serde_json::from_str(d).context("Corrupt project record"))
            .collect()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let affected = conn.execute(
            "DELETE FROM projects WHERE thread_id = ?1",
            params![thread_id],
        )?;
        Ok(affected > 0)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
