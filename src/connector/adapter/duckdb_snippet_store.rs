use std::collections::HashMap;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tracing::debug;

use super::duckdb::{decode_ts, encode_ts, escape_like, quoted_in_list, SharedConnection};
use crate::application::{SnippetContext, SnippetStore};
use crate::domain::{
    DomainError, Enrichment, EnrichmentKind, Language, ProcessingPhase, SearchFilters, Snippet,
};

pub struct DuckdbSnippetStore {
    conn: SharedConnection,
}

impl DuckdbSnippetStore {
    pub fn with_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snippets (
                id TEXT PRIMARY KEY,
                original_text TEXT NOT NULL,
                language TEXT NOT NULL,
                created_at TEXT NOT NULL,
                qualified_names TEXT DEFAULT '[]',
                dependencies TEXT DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS snippet_derivations (
                snippet_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                blob_sha TEXT NOT NULL,
                UNIQUE (snippet_id, commit_sha, blob_sha)
            );
            CREATE INDEX IF NOT EXISTS idx_derivations_commit
                ON snippet_derivations(commit_sha);
            CREATE INDEX IF NOT EXISTS idx_derivations_snippet
                ON snippet_derivations(snippet_id);

            CREATE TABLE IF NOT EXISTS snippet_enrichments (
                snippet_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (snippet_id, kind)
            );

            CREATE TABLE IF NOT EXISTS snippet_processing_states (
                snippet_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                UNIQUE (snippet_id, phase)
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(())
    }

    /// Load full snippets (derivations + enrichments attached) for a SQL
    /// predicate over the `snippets` table aliased as `s`.
    fn load_snippets_where(
        conn: &Connection,
        where_sql: &str,
    ) -> Result<Vec<Snippet>, DomainError> {
        let sql = format!(
            "SELECT DISTINCT s.id, s.original_text, s.language, s.created_at, \
                    s.qualified_names, s.dependencies \
             FROM snippets s {where_sql} ORDER BY s.id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query snippets: {}", e)))?;

        let mut snippets = Vec::new();
        for row in rows {
            let (id, text, language, created_at, names, deps) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            snippets.push(Snippet::reconstitute(
                id,
                text,
                Language::parse(&language),
                decode_ts(&created_at),
                serde_json::from_str(&names).unwrap_or_default(),
                serde_json::from_str(&deps).unwrap_or_default(),
                Vec::new(),
                Vec::new(),
            ));
        }
        Self::attach_details(conn, &mut snippets)?;
        Ok(snippets)
    }

    fn attach_details(conn: &Connection, snippets: &mut [Snippet]) -> Result<(), DomainError> {
        if snippets.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = snippets.iter().map(|s| s.id().to_string()).collect();
        let in_list = quoted_in_list(&ids);

        let mut derivations: HashMap<String, Vec<String>> = HashMap::new();
        let sql = format!(
            "SELECT DISTINCT snippet_id, blob_sha FROM snippet_derivations \
             WHERE snippet_id IN ({in_list})"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query derivations: {}", e)))?;
        for row in rows {
            let (snippet_id, blob_sha) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            derivations.entry(snippet_id).or_default().push(blob_sha);
        }

        let mut enrichments: HashMap<String, Vec<Enrichment>> = HashMap::new();
        let sql = format!(
            "SELECT snippet_id, kind, content, created_at FROM snippet_enrichments \
             WHERE snippet_id IN ({in_list}) ORDER BY created_at"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query enrichments: {}", e)))?;
        for row in rows {
            let (snippet_id, kind, content, created_at) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            if let Some(kind) = EnrichmentKind::parse(&kind) {
                enrichments
                    .entry(snippet_id)
                    .or_default()
                    .push(Enrichment::reconstitute(kind, content, decode_ts(&created_at)));
            }
        }

        for snippet in snippets.iter_mut() {
            let id = snippet.id().to_string();
            let derived = derivations.remove(&id).unwrap_or_default();
            let enriched = enrichments.remove(&id).unwrap_or_default();
            *snippet = Snippet::reconstitute(
                id,
                snippet.original_text().to_string(),
                snippet.language(),
                snippet.created_at(),
                snippet.qualified_names().to_vec(),
                snippet.dependencies().to_vec(),
                derived,
                enriched,
            );
        }
        Ok(())
    }

    /// Delete snippets that no commit derives anymore. Returns their ids.
    fn collect_orphans(conn: &Connection) -> Result<Vec<String>, DomainError> {
        let mut stmt = conn
            .prepare(
                "SELECT id FROM snippets WHERE NOT EXISTS \
                 (SELECT 1 FROM snippet_derivations d WHERE d.snippet_id = snippets.id)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query orphans: {}", e)))?;

        let mut orphans = Vec::new();
        for row in rows {
            orphans.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        if orphans.is_empty() {
            return Ok(orphans);
        }

        let in_list = quoted_in_list(&orphans);
        conn.execute_batch(&format!(
            r#"
            DELETE FROM snippet_enrichments WHERE snippet_id IN ({in_list});
            DELETE FROM snippet_processing_states WHERE snippet_id IN ({in_list});
            DELETE FROM snippets WHERE id IN ({in_list});
            "#
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete orphans: {}", e)))?;
        debug!(orphans = orphans.len(), "garbage-collected snippets");
        Ok(orphans)
    }
}

#[async_trait]
impl SnippetStore for DuckdbSnippetStore {
    async fn save(&self, commit_sha: &str, snippets: &[Snippet]) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for snippet in snippets {
            conn.execute(
                r#"
                INSERT INTO snippets
                    (id, original_text, language, created_at, qualified_names, dependencies)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (id) DO NOTHING
                "#,
                params![
                    snippet.id(),
                    snippet.original_text(),
                    snippet.language().as_str(),
                    encode_ts(snippet.created_at()),
                    serde_json::to_string(snippet.qualified_names()).unwrap_or_default(),
                    serde_json::to_string(snippet.dependencies()).unwrap_or_default(),
                ],
            )
            .map_err(|e| DomainError::storage(format!("Failed to insert snippet: {}", e)))?;

            for blob_sha in snippet.derives_from() {
                conn.execute(
                    r#"
                    INSERT INTO snippet_derivations (snippet_id, commit_sha, blob_sha)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT (snippet_id, commit_sha, blob_sha) DO NOTHING
                    "#,
                    params![snippet.id(), commit_sha, blob_sha],
                )
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert derivation: {}", e))
                })?;
            }
        }
        debug!(commit = commit_sha, snippets = snippets.len(), "snippets saved");
        Ok(())
    }

    async fn prune_for_commit(
        &self,
        commit_sha: &str,
        keep_ids: &[String],
    ) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        if keep_ids.is_empty() {
            conn.execute(
                "DELETE FROM snippet_derivations WHERE commit_sha = ?1",
                params![commit_sha],
            )
            .map_err(|e| DomainError::storage(format!("Failed to prune derivations: {}", e)))?;
        } else {
            let in_list = quoted_in_list(keep_ids);
            conn.execute(
                &format!(
                    "DELETE FROM snippet_derivations \
                     WHERE commit_sha = ?1 AND snippet_id NOT IN ({in_list})"
                ),
                params![commit_sha],
            )
            .map_err(|e| DomainError::storage(format!("Failed to prune derivations: {}", e)))?;
        }
        Self::collect_orphans(&conn)
    }

    async fn delete_for_commit(&self, commit_sha: &str) -> Result<Vec<String>, DomainError> {
        self.prune_for_commit(commit_sha, &[]).await
    }

    async fn get(&self, snippet_id: &str) -> Result<Option<Snippet>, DomainError> {
        let conn = self.conn.lock().await;
        let escaped = snippet_id.replace('\'', "''");
        let mut snippets =
            Self::load_snippets_where(&conn, &format!("WHERE s.id = '{escaped}'"))?;
        Ok(snippets.pop())
    }

    async fn get_by_ids(&self, snippet_ids: &[String]) -> Result<Vec<Snippet>, DomainError> {
        if snippet_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let in_list = quoted_in_list(snippet_ids);
        Self::load_snippets_where(&conn, &format!("WHERE s.id IN ({in_list})"))
    }

    async fn get_for_commit(&self, commit_sha: &str) -> Result<Vec<Snippet>, DomainError> {
        let conn = self.conn.lock().await;
        let escaped = commit_sha.replace('\'', "''");
        Self::load_snippets_where(
            &conn,
            &format!(
                "JOIN snippet_derivations d ON d.snippet_id = s.id \
                 WHERE d.commit_sha = '{escaped}'"
            ),
        )
    }

    async fn get_snippets_needing(
        &self,
        index_id: i64,
        phase: ProcessingPhase,
    ) -> Result<Vec<Snippet>, DomainError> {
        let conn = self.conn.lock().await;
        Self::load_snippets_where(
            &conn,
            &format!(
                "JOIN snippet_derivations d ON d.snippet_id = s.id \
                 JOIN commits c ON c.commit_sha = d.commit_sha \
                 WHERE c.repo_id = {index_id} AND NOT EXISTS \
                   (SELECT 1 FROM snippet_processing_states p \
                    WHERE p.snippet_id = s.id AND p.phase = '{}')",
                phase.as_str()
            ),
        )
    }

    async fn mark_completed(
        &self,
        snippet_ids: &[String],
        phase: ProcessingPhase,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        for snippet_id in snippet_ids {
            conn.execute(
                r#"
                INSERT INTO snippet_processing_states (snippet_id, phase)
                VALUES (?1, ?2)
                ON CONFLICT (snippet_id, phase) DO NOTHING
                "#,
                params![snippet_id, phase.as_str()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to mark completed: {}", e)))?;
        }
        Ok(())
    }

    async fn add_enrichment(
        &self,
        snippet_id: &str,
        enrichment: &Enrichment,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO snippet_enrichments (snippet_id, kind, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (snippet_id, kind) DO UPDATE SET
                content = excluded.content,
                created_at = excluded.created_at
            "#,
            params![
                snippet_id,
                enrichment.kind().as_str(),
                enrichment.content(),
                encode_ts(enrichment.created_at()),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to add enrichment: {}", e)))?;
        Ok(())
    }

    async fn filter_candidates(
        &self,
        filters: &SearchFilters,
    ) -> Result<Option<Vec<String>>, DomainError> {
        if filters.is_empty() {
            return Ok(None);
        }

        let mut clauses: Vec<String> = Vec::new();
        if let Some(language) = &filters.language {
            clauses.push(format!(
                "LOWER(s.language) = '{}'",
                language.replace('\'', "''")
            ));
        }
        if let Some(author) = &filters.author {
            clauses.push(format!(
                "c.author LIKE '%{}%' ESCAPE '\\'",
                escape_like(author)
            ));
        }
        if let Some(created_after) = filters.created_after {
            clauses.push(format!("s.created_at >= '{}'", encode_ts(created_after)));
        }
        if let Some(created_before) = filters.created_before {
            clauses.push(format!("s.created_at <= '{}'", encode_ts(created_before)));
        }
        if let Some(source_repo) = &filters.source_repo {
            clauses.push(format!(
                "r.sanitized_remote_uri LIKE '%{}%' ESCAPE '\\'",
                escape_like(source_repo)
            ));
        }
        if let Some(file_path) = &filters.file_path {
            clauses.push(format!(
                "f.path LIKE '%{}%' ESCAPE '\\'",
                escape_like(file_path)
            ));
        }

        let sql = format!(
            "SELECT DISTINCT s.id FROM snippets s \
             JOIN snippet_derivations d ON d.snippet_id = s.id \
             JOIN commits c ON c.commit_sha = d.commit_sha \
             JOIN repositories r ON r.id = c.repo_id \
             JOIN files f ON f.blob_sha = d.blob_sha \
             WHERE {}",
            clauses.join(" AND ")
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare filter query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to run filter query: {}", e)))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(Some(ids))
    }

    async fn get_contexts(
        &self,
        snippet_ids: &[String],
    ) -> Result<Vec<SnippetContext>, DomainError> {
        if snippet_ids.is_empty() {
            return Ok(Vec::new());
        }
        let snippets = self.get_by_ids(snippet_ids).await?;
        let conn = self.conn.lock().await;

        let in_list = quoted_in_list(snippet_ids);
        let sql = format!(
            "SELECT d.snippet_id, r.sanitized_remote_uri, f.path, c.author, c.date \
             FROM snippet_derivations d \
             JOIN commits c ON c.commit_sha = d.commit_sha \
             JOIN repositories r ON r.id = c.repo_id \
             JOIN files f ON f.blob_sha = d.blob_sha \
             WHERE d.snippet_id IN ({in_list}) ORDER BY c.date DESC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare context query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to run context query: {}", e)))?;

        // Latest derivation wins for source/path; authors accumulate.
        let mut sources: HashMap<String, (String, String)> = HashMap::new();
        let mut authors: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (snippet_id, uri, path, author) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            sources.entry(snippet_id.clone()).or_insert((uri, path));
            let entry = authors.entry(snippet_id).or_default();
            if !author.is_empty() && !entry.contains(&author) {
                entry.push(author);
            }
        }

        let mut contexts = Vec::with_capacity(snippets.len());
        for snippet in snippets {
            let id = snippet.id().to_string();
            let (source_uri, relative_path) = sources.remove(&id).unwrap_or_default();
            let created_at = snippet.created_at();
            contexts.push(SnippetContext {
                snippet,
                source_uri,
                relative_path,
                authors: authors.remove(&id).unwrap_or_default(),
                created_at,
            });
        }
        Ok(contexts)
    }
}
