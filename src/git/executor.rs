use crate::error::{GitError, GitResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

/// Timeout for quick read-only operations (single object reads)
pub const TIMEOUT_FAST: Duration = Duration::from_secs(5);
/// Timeout for standard git operations
pub const TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);
/// Timeout for whole-history rewrite operations
pub const TIMEOUT_LONG: Duration = Duration::from_secs(300);

/// Result of executing a git command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Executes git commands within a repository
#[derive(Debug, Clone)]
pub struct GitExecutor {
    repo_path: PathBuf,
    default_timeout: Duration,
    long_timeout: Duration,
}

impl GitExecutor {
    /// Create a new GitExecutor for the given repository path
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self::with_timeouts(repo_path, TIMEOUT_DEFAULT, TIMEOUT_LONG)
    }

    /// Create a GitExecutor with configured timeouts for standard and
    /// whole-history operations
    pub fn with_timeouts<P: AsRef<Path>>(
        repo_path: P,
        default_timeout: Duration,
        long_timeout: Duration,
    ) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            default_timeout,
            long_timeout,
        }
    }

    /// Replace the timeouts on an existing executor
    pub fn set_timeouts(&mut self, default_timeout: Duration, long_timeout: Duration) {
        self.default_timeout = default_timeout;
        self.long_timeout = long_timeout;
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Timeout budget for whole-history rewrites
    pub fn long_timeout(&self) -> Duration {
        self.long_timeout
    }

    /// Run a git subcommand with explicit arguments
    ///
    /// Arguments are passed verbatim to the git binary, never through a
    /// shell, so paths and commit messages may contain spaces safely.
    /// Example: executor.run(&["log", "--format=%H"])
    pub fn run(&self, args: &[&str]) -> GitResult<CommandOutput> {
        self.run_with_timeout(args, self.default_timeout)
    }

    /// Run a quick read-only git command with a short timeout
    pub fn run_fast(&self, args: &[&str]) -> GitResult<CommandOutput> {
        self.run_with_timeout(args, TIMEOUT_FAST)
    }

    /// Run a git command with a custom timeout
    pub fn run_with_timeout(&self, args: &[&str], _timeout: Duration) -> GitResult<CommandOutput> {
        if args.is_empty() {
            return Err(GitError::CommandFailed("Empty command".to_string()));
        }

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GitError::CommandFailed(format!("Failed to execute git: {}", e)))?;

        self.process_output(output, args)
    }

    /// Run a git command, tolerating a non-zero exit
    ///
    /// Some queries legitimately fail (log in an empty repo, rev-parse of a
    /// missing ref); callers inspect `success` instead of getting an Err.
    pub fn run_unchecked(&self, args: &[&str]) -> GitResult<CommandOutput> {
        if args.is_empty() {
            return Err(GitError::CommandFailed("Empty command".to_string()));
        }

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GitError::CommandFailed(format!("Failed to execute git: {}", e)))?;

        Ok(Self::into_command_output(output))
    }

    fn into_command_output(output: Output) -> CommandOutput {
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            success: output.status.success(),
        }
    }

    fn process_output(&self, output: Output, args: &[&str]) -> GitResult<CommandOutput> {
        let cmd_output = Self::into_command_output(output);

        if !cmd_output.success {
            return Err(GitError::CommandFailed(format!(
                "Command 'git {}' failed with exit code {}: {}",
                args.join(" "),
                cmd_output.exit_code,
                cmd_output.stderr.trim()
            )));
        }

        Ok(cmd_output)
    }

    /// Get the repository path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_run_status() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let result = executor.run(&["status", "--porcelain"]);
        assert!(result.is_ok());

        let output = result.unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, 0);
    }

    #[test]
    fn test_run_log_empty_repo() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        // Log command should fail in empty repo
        let result = executor.run(&["log", "--oneline"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_unchecked_tolerates_failure() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let output = executor.run_unchecked(&["log", "--oneline"]).unwrap();
        assert!(!output.success);
        assert_ne!(output.exit_code, 0);
    }

    #[test]
    fn test_args_with_spaces() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        std::fs::write(repo_path.join("a.txt"), "hello").unwrap();
        executor.run(&["add", "a.txt"]).unwrap();
        let result = executor.run(&["commit", "-m", "message with several words"]);
        assert!(result.is_ok());

        let log = executor.run(&["log", "--format=%s"]).unwrap();
        assert_eq!(log.stdout.trim(), "message with several words");
    }

    #[test]
    fn test_empty_command() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        let result = executor.run(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_repo_path() {
        let (_temp, repo_path) = create_test_repo();
        let executor = GitExecutor::new(&repo_path);

        assert_eq!(executor.repo_path(), repo_path.as_path());
    }

    #[test]
    fn test_configured_timeouts() {
        let (_temp, repo_path) = create_test_repo();

        let executor = GitExecutor::new(&repo_path);
        assert_eq!(executor.default_timeout(), TIMEOUT_DEFAULT);
        assert_eq!(executor.long_timeout(), TIMEOUT_LONG);

        let mut executor = GitExecutor::with_timeouts(
            &repo_path,
            Duration::from_secs(10),
            Duration::from_secs(120),
        );
        assert_eq!(executor.default_timeout(), Duration::from_secs(10));
        assert_eq!(executor.long_timeout(), Duration::from_secs(120));
        assert!(executor.run(&["status", "--porcelain"]).is_ok());

        executor.set_timeouts(Duration::from_secs(20), Duration::from_secs(240));
        assert_eq!(executor.default_timeout(), Duration::from_secs(20));
        assert_eq!(executor.long_timeout(), Duration::from_secs(240));
    }
}
