use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tracing::debug;

use super::duckdb::{decode_ts, encode_ts, SharedConnection};
use crate::application::TaskQueue;
use crate::domain::{DomainError, Task, TaskOperation};

/// Queue backed by one table. Holding the shared connection lock across the
/// SELECT + DELETE of `take` makes the queue a single logical dequeue point
/// for the whole process.
pub struct DuckdbTaskQueue {
    conn: SharedConnection,
}

impl DuckdbTaskQueue {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                dedup_key TEXT PRIMARY KEY,
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                priority BIGINT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks(priority);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }

    fn row_to_task(row: &Row) -> Result<Task, duckdb::Error> {
        let dedup_key: String = row.get(0)?;
        let operation: String = row.get(1)?;
        let payload: String = row.get(2)?;
        let priority: i64 = row.get(3)?;
        let created_at: String = row.get(4)?;
        Ok(Task::reconstitute(
            dedup_key,
            TaskOperation::parse(&operation).unwrap_or(TaskOperation::RefreshWorkingCopy),
            serde_json::from_str(&payload).unwrap_or_default(),
            priority,
            decode_ts(&created_at),
        ))
    }
}

#[async_trait]
impl TaskQueue for DuckdbTaskQueue {
    async fn enqueue(&self, task: &Task) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                r#"
                INSERT INTO tasks (dedup_key, operation, payload, priority, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (dedup_key) DO NOTHING
                "#,
                params![
                    task.dedup_key(),
                    task.operation().as_str(),
                    task.payload().to_string(),
                    task.priority(),
                    encode_ts(task.created_at()),
                ],
            )
            .map_err(|e| DomainError::storage(format!("Failed to enqueue task: {}", e)))?;
        if inserted == 0 {
            debug!(
                operation = task.operation().as_str(),
                "duplicate task dropped"
            );
        }
        Ok(inserted > 0)
    }

    async fn take(&self) -> Result<Option<Task>, DomainError> {
        // One lock hold covers select + delete, so concurrent takers cannot
        // dequeue the same task.
        let conn = self.conn.lock().await;
        let task = match conn.query_row(
            "SELECT dedup_key, operation, payload, priority, created_at FROM tasks \
             ORDER BY priority DESC, created_at ASC LIMIT 1",
            [],
            |row| Self::row_to_task(row),
        ) {
            Ok(task) => task,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => {
                return Err(DomainError::storage(format!("Failed to take task: {}", e)));
            }
        };

        conn.execute(
            "DELETE FROM tasks WHERE dedup_key = ?1",
            params![task.dedup_key()],
        )
        .map_err(|e| DomainError::storage(format!("Failed to remove taken task: {}", e)))?;
        Ok(Some(task))
    }

    async fn get(&self, dedup_key: &str) -> Result<Option<Task>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            "SELECT dedup_key, operation, payload, priority, created_at FROM tasks \
             WHERE dedup_key = ?1",
            params![dedup_key],
            |row| Self::row_to_task(row),
        ) {
            Ok(task) => Ok(Some(task)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to get task: {}", e))),
        }
    }

    async fn list(&self, operation: Option<TaskOperation>) -> Result<Vec<Task>, DomainError> {
        let conn = self.conn.lock().await;
        let mut sql = String::from(
            "SELECT dedup_key, operation, payload, priority, created_at FROM tasks",
        );
        if let Some(operation) = operation {
            sql.push_str(&format!(" WHERE operation = '{}'", operation.as_str()));
        }
        sql.push_str(" ORDER BY priority DESC, created_at ASC");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| Self::row_to_task(row))
            .map_err(|e| DomainError::storage(format!("Failed to list tasks: {}", e)))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(tasks)
    }
}
