use async_trait::async_trait;
use duckdb::{params, Connection, Row};

use super::duckdb::{decode_ts, encode_ts, SharedConnection};
use crate::application::StatusStore;
use crate::domain::{DomainError, StatusNode, TaskOperation, TaskState, TrackableType};

pub struct DuckdbStatusStore {
    conn: SharedConnection,
}

impl DuckdbStatusStore {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS task_status (
                id TEXT PRIMARY KEY,
                operation TEXT NOT NULL,
                state TEXT NOT NULL,
                parent TEXT,
                trackable_type TEXT,
                trackable_id BIGINT,
                total BIGINT DEFAULT 0,
                "current" BIGINT DEFAULT 0,
                message TEXT DEFAULT '',
                error TEXT DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_task_status_trackable
                ON task_status(trackable_type, trackable_id);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }

    fn row_to_node(row: &Row) -> Result<StatusNode, duckdb::Error> {
        let operation: String = row.get(1)?;
        let state: String = row.get(2)?;
        let trackable_type: Option<String> = row.get(4)?;
        Ok(StatusNode::reconstitute(
            row.get(0)?,
            TaskOperation::parse(&operation).unwrap_or(TaskOperation::CreateIndex),
            TaskState::parse(&state),
            row.get(3)?,
            trackable_type.and_then(|t| TrackableType::parse(&t)),
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            decode_ts(&row.get::<_, String>(10)?),
            decode_ts(&row.get::<_, String>(11)?),
        ))
    }
}

#[async_trait]
impl StatusStore for DuckdbStatusStore {
    async fn save(&self, node: &StatusNode) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO task_status
                (id, operation, state, parent, trackable_type, trackable_id,
                 total, "current", message, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                state = excluded.state,
                total = excluded.total,
                "current" = excluded."current",
                message = excluded.message,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
            params![
                node.id(),
                node.operation().as_str(),
                node.state().as_str(),
                node.parent(),
                node.trackable_type().map(|t| t.as_str()),
                node.trackable_id(),
                node.total(),
                node.current(),
                node.message(),
                node.error(),
                encode_ts(node.created_at()),
                encode_ts(node.updated_at()),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save status node: {}", e)))?;
        Ok(())
    }

    async fn load_with_hierarchy(
        &self,
        trackable_type: TrackableType,
        trackable_id: i64,
    ) -> Result<Vec<StatusNode>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                r#"SELECT id, operation, state, parent, trackable_type, trackable_id,
                          total, "current", message, error, created_at, updated_at
                   FROM task_status
                   WHERE trackable_type = ?1 AND trackable_id = ?2
                   ORDER BY created_at"#,
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![trackable_type.as_str(), trackable_id], |row| {
                Self::row_to_node(row)
            })
            .map_err(|e| DomainError::storage(format!("Failed to query status nodes: {}", e)))?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(nodes)
    }

    async fn sweep_non_terminal(&self, error: &str) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let swept = conn
            .execute(
                r#"UPDATE task_status SET state = 'failed', error = ?1, updated_at = ?2
                   WHERE state IN ('pending', 'started', 'in_progress')"#,
                params![error, encode_ts(chrono::Utc::now())],
            )
            .map_err(|e| DomainError::storage(format!("Failed to sweep status nodes: {}", e)))?;
        Ok(swept as u64)
    }

    async fn delete_for_trackable(
        &self,
        trackable_type: TrackableType,
        trackable_id: i64,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM task_status WHERE trackable_type = ?1 AND trackable_id = ?2",
            params![trackable_type.as_str(), trackable_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete status nodes: {}", e)))?;
        Ok(())
    }
}
