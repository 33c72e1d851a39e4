use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tracing::debug;

use super::duckdb::{decode_ts, encode_ts, SharedConnection};
use crate::application::RepositoryStore;
use crate::domain::{
    Branch, Commit, DomainError, Enrichment, EnrichmentKind, FileEntry, FileProcessingStatus,
    Repository, Tag,
};

pub struct DuckdbRepositoryStore {
    conn: SharedConnection,
}

impl DuckdbRepositoryStore {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id BIGINT PRIMARY KEY,
                sanitized_remote_uri TEXT NOT NULL UNIQUE,
                remote_uri TEXT NOT NULL,
                cloned_path TEXT NOT NULL,
                tracking_branch TEXT DEFAULT '',
                last_scanned_at TEXT,
                num_commits BIGINT DEFAULT 0,
                num_branches BIGINT DEFAULT 0,
                num_tags BIGINT DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS commits (
                commit_sha TEXT PRIMARY KEY,
                repo_id BIGINT NOT NULL,
                parent_sha TEXT DEFAULT '',
                author TEXT DEFAULT '',
                date TEXT NOT NULL,
                message TEXT DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_commits_repo ON commits(repo_id);

            CREATE TABLE IF NOT EXISTS files (
                blob_sha TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                mime_type TEXT DEFAULT '',
                size BIGINT DEFAULT 0,
                extension TEXT DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS commit_files (
                commit_sha TEXT NOT NULL,
                blob_sha TEXT NOT NULL,
                processing_status BIGINT DEFAULT 0,
                UNIQUE (commit_sha, blob_sha)
            );
            CREATE INDEX IF NOT EXISTS idx_commit_files_commit ON commit_files(commit_sha);

            CREATE TABLE IF NOT EXISTS branches (
                repo_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                head_commit_sha TEXT NOT NULL,
                UNIQUE (repo_id, name)
            );

            CREATE TABLE IF NOT EXISTS tags (
                repo_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                target_commit_sha TEXT NOT NULL,
                UNIQUE (repo_id, name)
            );

            CREATE TABLE IF NOT EXISTS commit_enrichments (
                commit_sha TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_commit_enrichments_commit
                ON commit_enrichments(commit_sha);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }

    fn row_to_repository(row: &Row) -> Result<Repository, duckdb::Error> {
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get::<_, Option<String>>(5)?.map(|s| decode_ts(&s)),
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            decode_ts(&row.get::<_, String>(9)?),
            decode_ts(&row.get::<_, String>(10)?),
        ))
    }

    fn row_to_commit(row: &Row) -> Result<Commit, duckdb::Error> {
        Ok(Commit::new(
            row.get::<_, String>(0)?,
            row.get(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            decode_ts(&row.get::<_, String>(4)?),
            row.get::<_, String>(5)?,
        ))
    }

    fn row_to_file(row: &Row) -> Result<FileEntry, duckdb::Error> {
        Ok(FileEntry::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get(3)?,
        ))
    }

    const REPO_COLUMNS: &'static str = "id, sanitized_remote_uri, remote_uri, cloned_path, \
         tracking_branch, last_scanned_at, num_commits, num_branches, num_tags, \
         created_at, updated_at";
}

#[async_trait]
impl RepositoryStore for DuckdbRepositoryStore {
    async fn save(&self, repository: &Repository) -> Result<i64, DomainError> {
        let conn = self.conn.lock().await;

        let id = if repository.id() == 0 {
            conn.query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM repositories",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to allocate repository id: {}", e)))?
        } else {
            repository.id()
        };

        conn.execute(
            r#"
            INSERT INTO repositories (id, sanitized_remote_uri, remote_uri, cloned_path,
                tracking_branch, last_scanned_at, num_commits, num_branches, num_tags,
                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (id) DO UPDATE SET
                sanitized_remote_uri = excluded.sanitized_remote_uri,
                remote_uri = excluded.remote_uri,
                cloned_path = excluded.cloned_path,
                tracking_branch = excluded.tracking_branch,
                last_scanned_at = excluded.last_scanned_at,
                num_commits = excluded.num_commits,
                num_branches = excluded.num_branches,
                num_tags = excluded.num_tags,
                updated_at = excluded.updated_at
            "#,
            params![
                id,
                repository.sanitized_remote_uri(),
                repository.remote_uri(),
                repository.cloned_path(),
                repository.tracking_branch(),
                repository.last_scanned_at().map(encode_ts),
                repository.num_commits(),
                repository.num_branches(),
                repository.num_tags(),
                encode_ts(repository.created_at()),
                encode_ts(repository.updated_at()),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save repository: {}", e)))?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE id = ?1",
            Self::REPO_COLUMNS
        );
        match conn.query_row(&sql, params![id], |row| Self::row_to_repository(row)) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository: {}",
                e
            ))),
        }
    }

    async fn get_by_uri(&self, sanitized_uri: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE sanitized_remote_uri = ?1",
            Self::REPO_COLUMNS
        );
        match conn.query_row(&sql, params![sanitized_uri], |row| {
            Self::row_to_repository(row)
        }) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository by uri: {}",
                e
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories ORDER BY id",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| Self::row_to_repository(row))
            .map_err(|e| DomainError::storage(format!("Failed to query repositories: {}", e)))?;

        let mut repositories = Vec::new();
        for row in rows {
            repositories.push(
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?,
            );
        }
        Ok(repositories)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(&format!(
            r#"
            DELETE FROM commit_enrichments WHERE commit_sha IN
                (SELECT commit_sha FROM commits WHERE repo_id = {id});
            DELETE FROM commit_files WHERE commit_sha IN
                (SELECT commit_sha FROM commits WHERE repo_id = {id});
            DELETE FROM branches WHERE repo_id = {id};
            DELETE FROM tags WHERE repo_id = {id};
            DELETE FROM commits WHERE repo_id = {id};
            DELETE FROM repositories WHERE id = {id};
            "#
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete repository: {}", e)))?;
        debug!(repo_id = id, "repository rows deleted");
        Ok(())
    }

    async fn touch_updated_at(&self, id: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE repositories SET updated_at = ?1 WHERE id = ?2",
            params![encode_ts(chrono::Utc::now()), id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to touch repository: {}", e)))?;
        Ok(())
    }

    async fn upsert_commits(&self, commits: &[Commit]) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for commit in commits {
            conn.execute(
                r#"
                INSERT INTO commits (commit_sha, repo_id, parent_sha, author, date, message)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (commit_sha) DO NOTHING
                "#,
                params![
                    commit.commit_sha(),
                    commit.repo_id(),
                    commit.parent_sha(),
                    commit.author(),
                    encode_ts(commit.date()),
                    commit.message(),
                ],
            )
            .map_err(|e| DomainError::storage(format!("Failed to upsert commit: {}", e)))?;
        }
        Ok(())
    }

    async fn get_commit(&self, commit_sha: &str) -> Result<Option<Commit>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            "SELECT commit_sha, repo_id, parent_sha, author, date, message \
             FROM commits WHERE commit_sha = ?1",
            params![commit_sha],
            |row| Self::row_to_commit(row),
        ) {
            Ok(commit) => Ok(Some(commit)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query commit: {}",
                e
            ))),
        }
    }

    async fn get_commits(
        &self,
        repo_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Commit>, DomainError> {
        let conn = self.conn.lock().await;
        let mut sql = String::from(
            "SELECT commit_sha, repo_id, parent_sha, author, date, message \
             FROM commits WHERE repo_id = ?1 ORDER BY date DESC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id], |row| Self::row_to_commit(row))
            .map_err(|e| DomainError::storage(format!("Failed to query commits: {}", e)))?;

        let mut commits = Vec::new();
        for row in rows {
            commits.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(commits)
    }

    async fn upsert_files(&self, files: &[FileEntry]) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for file in files {
            conn.execute(
                r#"
                INSERT INTO files (blob_sha, path, mime_type, size, extension)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (blob_sha) DO NOTHING
                "#,
                params![
                    file.blob_sha(),
                    file.path(),
                    file.mime_type(),
                    file.size(),
                    file.extension(),
                ],
            )
            .map_err(|e| DomainError::storage(format!("Failed to upsert file: {}", e)))?;
        }
        Ok(())
    }

    async fn get_file(&self, blob_sha: &str) -> Result<Option<FileEntry>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            "SELECT blob_sha, path, mime_type, size FROM files WHERE blob_sha = ?1",
            params![blob_sha],
            |row| Self::row_to_file(row),
        ) {
            Ok(file) => Ok(Some(file)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to query file: {}", e))),
        }
    }

    async fn set_commit_files(
        &self,
        commit_sha: &str,
        files: &[(String, FileProcessingStatus)],
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM commit_files WHERE commit_sha = ?1",
            params![commit_sha],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear commit files: {}", e)))?;
        for (blob_sha, status) in files {
            conn.execute(
                "INSERT INTO commit_files (commit_sha, blob_sha, processing_status) \
                 VALUES (?1, ?2, ?3)",
                params![commit_sha, blob_sha, status.as_i64()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to link commit file: {}", e)))?;
        }
        Ok(())
    }

    async fn get_commit_files(&self, commit_sha: &str) -> Result<Vec<FileEntry>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT f.blob_sha, f.path, f.mime_type, f.size \
                 FROM files f JOIN commit_files cf ON cf.blob_sha = f.blob_sha \
                 WHERE cf.commit_sha = ?1 ORDER BY f.path",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_sha], |row| Self::row_to_file(row))
            .map_err(|e| DomainError::storage(format!("Failed to query commit files: {}", e)))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(files)
    }

    async fn get_changed_files(&self, commit_sha: &str) -> Result<Vec<FileEntry>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT f.blob_sha, f.path, f.mime_type, f.size \
                 FROM files f JOIN commit_files cf ON cf.blob_sha = f.blob_sha \
                 WHERE cf.commit_sha = ?1 AND cf.processing_status IN (1, 2) \
                 ORDER BY f.path",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_sha], |row| Self::row_to_file(row))
            .map_err(|e| DomainError::storage(format!("Failed to query changed files: {}", e)))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(files)
    }

    async fn clear_file_statuses(&self, commit_sha: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE commit_files SET processing_status = 0 WHERE commit_sha = ?1",
            params![commit_sha],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear file statuses: {}", e)))?;
        Ok(())
    }

    async fn replace_branches(
        &self,
        repo_id: i64,
        branches: &[Branch],
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM branches WHERE repo_id = ?1", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to clear branches: {}", e)))?;
        for branch in branches {
            conn.execute(
                "INSERT INTO branches (repo_id, name, head_commit_sha) VALUES (?1, ?2, ?3)",
                params![repo_id, branch.name(), branch.head_commit_sha()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to insert branch: {}", e)))?;
        }
        Ok(())
    }

    async fn get_branches(&self, repo_id: i64) -> Result<Vec<Branch>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repo_id, name, head_commit_sha FROM branches \
                 WHERE repo_id = ?1 ORDER BY name",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id], |row| {
                Ok(Branch::new(
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query branches: {}", e)))?;

        let mut branches = Vec::new();
        for row in rows {
            branches
                .push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(branches)
    }

    async fn replace_tags(&self, repo_id: i64, tags: &[Tag]) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM tags WHERE repo_id = ?1", params![repo_id])
            .map_err(|e| DomainError::storage(format!("Failed to clear tags: {}", e)))?;
        for tag in tags {
            conn.execute(
                "INSERT INTO tags (repo_id, name, target_commit_sha) VALUES (?1, ?2, ?3)",
                params![repo_id, tag.name(), tag.target_commit_sha()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to insert tag: {}", e)))?;
        }
        Ok(())
    }

    async fn get_tags(&self, repo_id: i64) -> Result<Vec<Tag>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repo_id, name, target_commit_sha FROM tags \
                 WHERE repo_id = ?1 ORDER BY name",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id], |row| {
                Ok(Tag::new(
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query tags: {}", e)))?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(tags)
    }

    async fn save_commit_enrichment(
        &self,
        commit_sha: &str,
        enrichment: &Enrichment,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO commit_enrichments (commit_sha, kind, content, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                commit_sha,
                enrichment.kind().as_str(),
                enrichment.content(),
                encode_ts(enrichment.created_at()),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save commit enrichment: {}", e)))?;
        Ok(())
    }

    async fn get_commit_enrichments(
        &self,
        commit_sha: &str,
    ) -> Result<Vec<Enrichment>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT kind, content, created_at FROM commit_enrichments \
                 WHERE commit_sha = ?1 ORDER BY created_at",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_sha], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| {
                DomainError::storage(format!("Failed to query commit enrichments: {}", e))
            })?;

        let mut enrichments = Vec::new();
        for row in rows {
            let (kind, content, created_at) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            let Some(kind) = EnrichmentKind::parse(&kind) else {
                continue;
            };
            enrichments.push(Enrichment::reconstitute(kind, content, decode_ts(&created_at)));
        }
        Ok(enrichments)
    }

    async fn has_commit_enrichment(
        &self,
        commit_sha: &str,
        kind: EnrichmentKind,
    ) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM commit_enrichments WHERE commit_sha = ?1 AND kind = ?2",
                params![commit_sha, kind.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| {
                DomainError::storage(format!("Failed to check commit enrichment: {}", e))
            })?;
        Ok(count > 0)
    }
}
