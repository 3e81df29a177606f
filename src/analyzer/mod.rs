//! Read-only history traversal: statistics for reporting and the
//! validation data the plan compiler cross-checks against.

use crate::error::{GitError, GitResult};
use crate::git::parser::{self, CommitEntry};
use crate::git::repository::{COMMIT_LOG_FORMAT, Repository};
use std::collections::{BTreeMap, BTreeSet};

/// A consistent view of a repository's history as of one head commit
///
/// The head is resolved exactly once at the start of the traversal, so a
/// concurrent branch move cannot produce a snapshot mixing two states.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub head: String,
    pub commit_count: usize,
    /// `Name <email>` -> number of commits authored
    pub authors: BTreeMap<String, usize>,
    /// path -> number of commits touching it
    pub file_touches: BTreeMap<String, usize>,
    /// All commits reachable from the pinned head, newest first
    pub commits: Vec<CommitEntry>,
}

/// Full detail for a single commit
#[derive(Debug, Clone)]
pub struct CommitDetails {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub date: String,
    pub files: Vec<String>,
}

/// Produce a history snapshot pinned to the current head
pub fn analyze(repo: &Repository) -> GitResult<HistorySnapshot> {
    let head = repo.head_commit()?;
    let commits = repo.commits_from(&head, None)?;

    let mut authors: BTreeMap<String, usize> = BTreeMap::new();
    for commit in &commits {
        *authors.entry(commit.author()).or_insert(0) += 1;
    }

    let output = repo
        .executor()
        .run(&["log", "--name-only", "--format=%x01%H", &head])?;
    let mut file_touches: BTreeMap<String, usize> = BTreeMap::new();
    for (_, files) in parser::parse_name_only_log(&output.stdout)? {
        for file in files {
            *file_touches.entry(file).or_insert(0) += 1;
        }
    }

    Ok(HistorySnapshot {
        head,
        commit_count: commits.len(),
        authors,
        file_touches,
        commits,
    })
}

/// Commits that touched a path, following renames, newest first
pub fn file_history(repo: &Repository, path: &str) -> GitResult<Vec<CommitEntry>> {
    let output = repo
        .executor()
        .run_unchecked(&["log", "--follow", COMMIT_LOG_FORMAT, "--", path])?;
    if !output.success {
        return Ok(Vec::new());
    }
    parser::parse_commit_log(&output.stdout)
}

/// Message, author, date and changed files for one commit
pub fn commit_details(repo: &Repository, commit_id: &str) -> GitResult<CommitDetails> {
    let resolved = repo
        .resolve_commit(commit_id)?
        .ok_or_else(|| GitError::CommandFailed(format!("Unknown commit: {}", commit_id)))?;

    let output = repo
        .executor()
        .run_fast(&["show", "--no-patch", COMMIT_LOG_FORMAT, &resolved])?;
    let entry = parser::parse_commit_log(&output.stdout)?
        .into_iter()
        .next()
        .ok_or_else(|| GitError::ParseError("Empty show output".to_string()))?;

    let files_output =
        repo.executor()
            .run_fast(&["show", "--name-only", "--format=", &resolved])?;
    let files = files_output
        .stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();

    Ok(CommitDetails {
        hash: entry.hash,
        author_name: entry.author_name,
        author_email: entry.author_email,
        message: entry.message,
        date: entry.date,
        files,
    })
}

/// Every path that has ever existed in history, including deleted ones
pub fn list_all_files(repo: &Repository) -> GitResult<BTreeSet<String>> {
    let output = repo
        .executor()
        .run_unchecked(&["log", "--all", "--name-only", "--format="])?;
    if !output.success {
        return Ok(BTreeSet::new());
    }
    Ok(output
        .stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// Number of commits on any branch that touch the given pathspec
pub fn commits_touching_path(repo: &Repository, pathspec: &str) -> GitResult<usize> {
    let output = repo
        .executor()
        .run_unchecked(&["log", "--all", "--format=%H", "--", pathspec])?;
    if !output.success {
        return Ok(0);
    }
    Ok(output.stdout.lines().filter(|l| !l.is_empty()).count())
}
