use crate::error::{GitError, GitResult};
use crate::git::executor::GitExecutor;
use crate::git::parser::{self, CommitEntry, RefEntry};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log format producing NUL-separated hash, author, email, subject, ISO date
pub const COMMIT_LOG_FORMAT: &str = "--format=%H%x00%an%x00%ae%x00%s%x00%aI";

/// Represents a git repository and provides read access to its history
///
/// A Repository is cheap to construct and holds no open handles; every
/// query re-reads the object store, since the repository may be changed
/// by external processes between calls.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    executor: GitExecutor,
}

impl Repository {
    /// Detect git repository from current working directory
    pub fn discover() -> GitResult<Self> {
        let current_dir = env::current_dir().map_err(GitError::IoError)?;
        Self::discover_from(&current_dir)
    }

    /// Detect git repository starting from a specific directory
    pub fn discover_from<P: AsRef<Path>>(start_path: P) -> GitResult<Self> {
        let mut current = start_path.as_ref().to_path_buf();

        loop {
            let git_dir = current.join(".git");
            if git_dir.exists() {
                return Ok(Self::new(current));
            }

            if !current.pop() {
                return Err(GitError::NotARepository);
            }
        }
    }

    /// Open a known repository path, verifying it has a git object store
    pub fn open<P: AsRef<Path>>(path: P) -> GitResult<Self> {
        let path = path.as_ref();
        if !path.join(".git").exists() {
            return Err(GitError::NotARepository);
        }
        Ok(Self::new(path))
    }

    /// Create a Repository for a known git directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let executor = GitExecutor::new(&path);

        Self { path, executor }
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply configured timeouts to this repository's executor
    pub fn set_timeouts(&mut self, default_timeout: Duration, long_timeout: Duration) {
        self.executor.set_timeouts(default_timeout, long_timeout);
    }

    /// Resolve the current HEAD commit hash
    pub fn head_commit(&self) -> GitResult<String> {
        let output = self.executor.run_fast(&["rev-parse", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Get the current branch name, or None in detached HEAD state
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.executor.run_unchecked(&["branch", "--show-current"])?;
        if !output.success {
            return Ok(None);
        }
        let branch = output.stdout.trim();
        if branch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    /// Resolve a revision to a full commit hash, or None if unknown
    pub fn resolve_commit(&self, rev: &str) -> GitResult<Option<String>> {
        let spec = format!("{}^{{commit}}", rev);
        let output = self
            .executor
            .run_unchecked(&["rev-parse", "--verify", "--quiet", &spec])?;
        if output.success {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Check whether `ancestor` is an ancestor of `descendant`
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> GitResult<bool> {
        let output =
            self.executor
                .run_unchecked(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(GitError::CommandFailed(format!(
                "merge-base --is-ancestor failed: {}",
                output.stderr.trim()
            ))),
        }
    }

    /// Count commits in `from..to`
    pub fn count_range(&self, from: &str, to: &str) -> GitResult<usize> {
        let range = format!("{}..{}", from, to);
        let output = self.executor.run(&["rev-list", "--count", &range])?;
        parser::parse_count(&output.stdout)
    }

    /// Commits reachable from the given revision, newest first
    pub fn commits_from(&self, rev: &str, max_count: Option<usize>) -> GitResult<Vec<CommitEntry>> {
        let limit;
        let mut args = vec!["log", COMMIT_LOG_FORMAT, rev];
        if let Some(n) = max_count {
            limit = format!("-n{}", n);
            args.push(&limit);
        }

        let output = self.executor.run_unchecked(&args)?;
        if !output.success {
            // Empty repository has no commits
            return Ok(Vec::new());
        }
        parser::parse_commit_log(&output.stdout)
    }

    /// Check whether a ref exists (full ref name, e.g. refs/heads/backup/x)
    pub fn ref_exists(&self, full_ref: &str) -> GitResult<bool> {
        let output = self
            .executor
            .run_unchecked(&["show-ref", "--verify", "--quiet", full_ref])?;
        Ok(output.success)
    }

    /// List refs under a prefix with their target hashes
    pub fn list_refs(&self, prefix: &str) -> GitResult<Vec<RefEntry>> {
        let output = self.executor.run(&[
            "for-each-ref",
            "--format=%(refname:short)%00%(objectname)",
            prefix,
        ])?;
        parser::parse_ref_list(&output.stdout)
    }

    /// Total object-store size in bytes (loose plus packed)
    pub fn object_store_size(&self) -> GitResult<u64> {
        let output = self.executor.run(&["count-objects", "-v"])?;
        parser::parse_count_objects(&output.stdout)
    }

    /// Get the git executor for this repository
    pub fn executor(&self) -> &GitExecutor {
        &self.executor
    }
}
