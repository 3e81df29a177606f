//! Pre-rewrite safety nets kept as ordinary git branches
//!
//! A backup is a branch under `backup/` pointing at the pre-image head.
//! Branch creation is a single atomic ref update, and the objects it pins
//! stay reachable, so `git gc` will never collect a backed-up history.
//! Backups are never deleted automatically.

use crate::error::GitError;
use crate::git::repository::Repository;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

const BACKUP_PREFIX: &str = "backup/";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Backup ref {0} no longer points at the recorded commit")]
    RefMoved(String),

    #[error("Current history has diverged from backup {0}; pass force to overwrite")]
    DivergedHistory(String),

    #[error("Git error: {0}")]
    Git(#[from] GitError),
}

/// A single backup branch and what it protects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Short ref name, e.g. `backup/20260829-101500-pre-rewrite`
    pub ref_name: String,
    pub commit: String,
    pub created_at: Option<DateTime<Utc>>,
    pub label: String,
}

/// Creates, lists and restores backup branches for one repository
pub struct BackupManager {
    repo: Repository,
}

impl BackupManager {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a backup branch at the current head
    pub fn create(&self, label: &str) -> Result<BackupRecord, GitError> {
        let commit = self.repo.head_commit()?;
        let created_at = Utc::now();
        let label = sanitize_label(label);
        let ref_name = format!(
            "{}{}-{}",
            BACKUP_PREFIX,
            created_at.format(TIMESTAMP_FORMAT),
            label
        );

        let output = self
            .repo
            .executor()
            .run_unchecked(&["branch", &ref_name, &commit])?;
        let ref_name = if output.success {
            ref_name
        } else {
            // Same label within the same second; retry with a suffix
            let retry = format!("{}-{:04x}", ref_name, rand::random::<u16>());
            self.repo.executor().run(&["branch", &retry, &commit])?;
            retry
        };

        Ok(BackupRecord {
            ref_name,
            commit,
            created_at: Some(created_at),
            label,
        })
    }

    /// List all backup branches, newest first
    pub fn list(&self) -> Result<Vec<BackupRecord>, GitError> {
        let refs = self.repo.list_refs("refs/heads/backup/")?;
        let mut records: Vec<BackupRecord> = refs
            .into_iter()
            .map(|r| {
                let (created_at, label) = parse_ref_name(&r.name);
                BackupRecord {
                    ref_name: r.name,
                    commit: r.hash,
                    created_at,
                    label,
                }
            })
            .collect();
        records.sort_by(|a, b| b.ref_name.cmp(&a.ref_name));
        Ok(records)
    }

    /// Find a backup by its short ref name
    pub fn find(&self, ref_name: &str) -> Result<Option<BackupRecord>, GitError> {
        Ok(self.list()?.into_iter().find(|r| r.ref_name == ref_name))
    }

    /// Move the current branch back to a backup
    ///
    /// Refuses when the backup ref has moved since the record was taken, or
    /// when the current head is not a descendant of the backup commit (the
    /// usual state after a rewrite) unless `force` is set.
    pub fn restore(&self, record: &BackupRecord, force: bool) -> Result<(), RestoreError> {
        let full_ref = format!("refs/heads/{}", record.ref_name);
        if !self.repo.ref_exists(&full_ref)? {
            return Err(RestoreError::RefMoved(record.ref_name.clone()));
        }
        let current_target = self
            .repo
            .resolve_commit(&record.ref_name)?
            .ok_or_else(|| RestoreError::RefMoved(record.ref_name.clone()))?;
        if current_target != record.commit {
            return Err(RestoreError::RefMoved(record.ref_name.clone()));
        }

        if !force {
            let head = self.repo.head_commit()?;
            if head != record.commit && !self.repo.is_ancestor(&record.commit, &head)? {
                return Err(RestoreError::DivergedHistory(record.ref_name.clone()));
            }
        }

        self.repo
            .executor()
            .run(&["reset", "--hard", &record.commit])?;
        Ok(())
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "backup".to_string()
    } else {
        cleaned
    }
}

fn parse_ref_name(name: &str) -> (Option<DateTime<Utc>>, String) {
    let rest = name.strip_prefix(BACKUP_PREFIX).unwrap_or(name);
    // <YYYYmmdd>-<HHMMSS>-<label>
    let mut parts = rest.splitn(3, '-');
    let date = parts.next().unwrap_or("");
    let time = parts.next().unwrap_or("");
    let label = parts.next().unwrap_or("").to_string();

    let stamp = format!("{}-{}", date, time);
    let created_at = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc());

    (created_at, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        Command::new("git")
            .args(["init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (temp_dir, repo_path)
    }

    fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
        fs::write(repo_path.join(file), content).unwrap();
        Command::new("git")
            .args(["add", file])
            .current_dir(repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(repo_path)
            .output()
            .unwrap();
    }

    #[test]
    fn test_create_and_list() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo.clone());

        let record = manager.create("pre-rewrite").unwrap();
        assert!(record.ref_name.starts_with("backup/"));
        assert!(record.ref_name.ends_with("-pre-rewrite"));
        assert_eq!(record.commit, repo.head_commit().unwrap());

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].ref_name, record.ref_name);
        assert_eq!(listed[0].label, "pre-rewrite");
        assert!(listed[0].created_at.is_some());
    }

    #[test]
    fn test_label_sanitized() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo);

        let record = manager.create("has spaces/and:colons").unwrap();
        assert!(record.ref_name.ends_with("-has-spaces-and-colons"));
    }

    #[test]
    fn test_duplicate_label_gets_suffix() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo);

        let first = manager.create("same").unwrap();
        let second = manager.create("same").unwrap();
        assert_ne!(first.ref_name, second.ref_name);
        assert_eq!(manager.list().unwrap().len(), 2);
    }

    #[test]
    fn test_restore_after_new_commits() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo.clone());
        let record = manager.create("checkpoint").unwrap();

        create_commit(&repo_path, "b.txt", "two", "second");
        assert_ne!(repo.head_commit().unwrap(), record.commit);

        // Backup is an ancestor of head, so no force needed
        manager.restore(&record, false).unwrap();
        assert_eq!(repo.head_commit().unwrap(), record.commit);
    }

    #[test]
    fn test_restore_diverged_requires_force() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");
        create_commit(&repo_path, "b.txt", "two", "second");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo.clone());
        let record = manager.create("checkpoint").unwrap();

        // Amending rewrites the tip, so head and backup diverge
        Command::new("git")
            .args(["commit", "--amend", "-m", "second (amended)"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let result = manager.restore(&record, false);
        assert!(matches!(result, Err(RestoreError::DivergedHistory(_))));

        manager.restore(&record, true).unwrap();
        assert_eq!(repo.head_commit().unwrap(), record.commit);
    }

    #[test]
    fn test_restore_detects_moved_ref() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");

        let repo = Repository::open(&repo_path).unwrap();
        let manager = BackupManager::new(repo);
        let record = manager.create("checkpoint").unwrap();

        Command::new("git")
            .args(["branch", "-D", &record.ref_name])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let result = manager.restore(&record, false);
        assert!(matches!(result, Err(RestoreError::RefMoved(_))));
    }

    #[test]
    fn test_parse_ref_name() {
        let (created_at, label) = parse_ref_name("backup/20260829-101500-pre-rewrite");
        assert!(created_at.is_some());
        assert_eq!(label, "pre-rewrite");

        let (created_at, label) = parse_ref_name("backup/not-a-timestamp");
        assert!(created_at.is_none());
        assert_eq!(label, "timestamp");
    }
}
