use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::application::{GitAdapter, GitBranchInfo, GitCommitInfo, GitFileInfo, GitTagInfo};
use crate::domain::DomainError;

/// Field and record separators for `git log` parsing; neither occurs in
/// commit metadata.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// [`GitAdapter`] backed by the `git` binary. Every operation shells out via
/// `tokio::process::Command`; stderr becomes the error message on non-zero
/// exit.
pub struct GitCliAdapter;

impl GitCliAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(args: &[&str]) -> Result<Vec<u8>, DomainError> {
        debug!(?args, "git");
        let output = tokio::process::Command::new("git")
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::git(format!("Failed to spawn git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::git(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn run_git_text(args: &[&str]) -> Result<String, DomainError> {
        let stdout = Self::run_git(args).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl Default for GitCliAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitAdapter for GitCliAdapter {
    async fn clone_repository(&self, remote_uri: &str, dest: &Path) -> Result<(), DomainError> {
        let dest = dest.to_string_lossy();
        Self::run_git(&["clone", remote_uri, &dest]).await?;
        Ok(())
    }

    async fn pull(&self, repo_path: &Path) -> Result<(), DomainError> {
        let path = repo_path.to_string_lossy();
        Self::run_git(&["-C", &path, "fetch", "--all", "--tags", "--prune"]).await?;
        Self::run_git(&["-C", &path, "pull", "--ff-only"]).await?;
        Ok(())
    }

    async fn checkout_commit(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let path = repo_path.to_string_lossy();
        Self::run_git(&["-C", &path, "checkout", "--force", commit_sha]).await?;
        Ok(())
    }

    async fn get_default_branch(&self, repo_path: &Path) -> Result<String, DomainError> {
        let path = repo_path.to_string_lossy();
        // The remote HEAD is authoritative; a detached or renamed local HEAD
        // still resolves.
        if let Ok(output) = Self::run_git_text(&[
            "-C",
            &path,
            "symbolic-ref",
            "--short",
            "refs/remotes/origin/HEAD",
        ])
        .await
        {
            let branch = output.trim();
            if let Some(name) = branch.strip_prefix("origin/") {
                return Ok(name.to_string());
            }
        }
        let output =
            Self::run_git_text(&["-C", &path, "rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(output.trim().to_string())
    }

    async fn get_commits(
        &self,
        repo_path: &Path,
        branch: &str,
    ) -> Result<Vec<GitCommitInfo>, DomainError> {
        let path = repo_path.to_string_lossy();
        let format = format!("%H{FIELD_SEP}%P{FIELD_SEP}%an <%ae>{FIELD_SEP}%aI{FIELD_SEP}%B{RECORD_SEP}");
        let output = Self::run_git_text(&[
            "-C",
            &path,
            "log",
            branch,
            &format!("--format={format}"),
        ])
        .await?;

        let mut commits = Vec::new();
        for record in output.split(RECORD_SEP) {
            let record = record.trim_start_matches(['\n', '\r']);
            if record.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
            if fields.len() < 5 {
                continue;
            }
            let date = DateTime::parse_from_rfc3339(fields[3])
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default();
            commits.push(GitCommitInfo {
                commit_sha: fields[0].to_string(),
                parent_sha: fields[1].split_whitespace().next().unwrap_or("").to_string(),
                author: fields[2].to_string(),
                date,
                message: fields[4].trim_end().to_string(),
            });
        }
        Ok(commits)
    }

    async fn get_commit_files(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<Vec<GitFileInfo>, DomainError> {
        let path = repo_path.to_string_lossy();
        let output =
            Self::run_git_text(&["-C", &path, "ls-tree", "-r", "-l", commit_sha]).await?;

        let mut files = Vec::new();
        for line in output.lines() {
            // <mode> blob <sha> <size>\t<path>
            let Some((meta, file_path)) = line.split_once('\t') else {
                continue;
            };
            let parts: Vec<&str> = meta.split_whitespace().collect();
            if parts.len() < 4 || parts[1] != "blob" {
                continue;
            }
            files.push(GitFileInfo {
                blob_sha: parts[2].to_string(),
                path: file_path.to_string(),
                size: parts[3].parse().unwrap_or(0),
            });
        }
        Ok(files)
    }

    async fn get_file_content(
        &self,
        repo_path: &Path,
        blob_sha: &str,
    ) -> Result<String, DomainError> {
        let path = repo_path.to_string_lossy();
        Self::run_git_text(&["-C", &path, "cat-file", "blob", blob_sha]).await
    }

    async fn get_all_branches(
        &self,
        repo_path: &Path,
    ) -> Result<Vec<GitBranchInfo>, DomainError> {
        let path = repo_path.to_string_lossy();
        let format = format!("%(refname:short){FIELD_SEP}%(objectname)");
        let output = Self::run_git_text(&[
            "-C",
            &path,
            "for-each-ref",
            "refs/remotes/origin",
            &format!("--format={format}"),
        ])
        .await?;

        let mut branches = Vec::new();
        for line in output.lines() {
            let Some((name, sha)) = line.split_once(FIELD_SEP) else {
                continue;
            };
            let Some(name) = name.strip_prefix("origin/") else {
                continue;
            };
            if name == "HEAD" {
                continue;
            }
            branches.push(GitBranchInfo {
                name: name.to_string(),
                head_commit_sha: sha.to_string(),
            });
        }
        // A fresh local-only repository has no remote refs; fall back to
        // local heads so the tracking branch still resolves.
        if branches.is_empty() {
            let format = format!("%(refname:short){FIELD_SEP}%(objectname)");
            let output = Self::run_git_text(&[
                "-C",
                &path,
                "for-each-ref",
                "refs/heads",
                &format!("--format={format}"),
            ])
            .await?;
            for line in output.lines() {
                let Some((name, sha)) = line.split_once(FIELD_SEP) else {
                    continue;
                };
                branches.push(GitBranchInfo {
                    name: name.to_string(),
                    head_commit_sha: sha.to_string(),
                });
            }
        }
        Ok(branches)
    }

    async fn get_all_tags(&self, repo_path: &Path) -> Result<Vec<GitTagInfo>, DomainError> {
        let path = repo_path.to_string_lossy();
        // Annotated tags peel to the commit via *objectname; lightweight
        // tags point at it directly.
        let format = format!("%(refname:short){FIELD_SEP}%(*objectname){FIELD_SEP}%(objectname)");
        let output = Self::run_git_text(&[
            "-C",
            &path,
            "for-each-ref",
            "refs/tags",
            &format!("--format={format}"),
        ])
        .await?;

        let mut tags = Vec::new();
        for line in output.lines() {
            let fields: Vec<&str> = line.splitn(3, FIELD_SEP).collect();
            if fields.len() < 3 {
                continue;
            }
            let target = if fields[1].is_empty() { fields[2] } else { fields[1] };
            tags.push(GitTagInfo {
                name: fields[0].to_string(),
                target_commit_sha: target.to_string(),
            });
        }
        Ok(tags)
    }

    async fn get_commit_diff(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<String, DomainError> {
        let path = repo_path.to_string_lossy();
        Self::run_git_text(&["-C", &path, "show", "--format=", "--patch", commit_sha]).await
    }
}
