use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only operation log
///
/// History rewriting destroys its own evidence, so every execution,
/// backup and restore is recorded before the fact with user, repository
/// and timestamp.
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        let log_path = Self::default_log_path()?;

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/resculpt/operations.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("resculpt")
            .join("operations.log"))
    }

    /// Log a plan execution attempt and its outcome
    pub fn log_execution(
        &self,
        plan_summary: &str,
        repo_path: &Path,
        outcome: &str,
    ) -> std::io::Result<()> {
        self.append(repo_path, &format!("[EXECUTE] [{}] {}", outcome, plan_summary))
    }

    /// Log a backup branch creation
    pub fn log_backup(&self, ref_name: &str, commit: &str, repo_path: &Path) -> std::io::Result<()> {
        self.append(repo_path, &format!("[BACKUP] {} -> {}", ref_name, commit))
    }

    /// Log a restore, noting whether diverged history was overwritten
    pub fn log_restore(&self, ref_name: &str, repo_path: &Path, forced: bool) -> std::io::Result<()> {
        let mode = if forced { "forced" } else { "clean" };
        self.append(repo_path, &format!("[RESTORE] [{}] {}", mode, ref_name))
    }

    fn append(&self, repo_path: &Path, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());

        let log_entry = format!(
            "[{}] [{}] [{}] {}\n",
            timestamp,
            user,
            repo_path.display(),
            entry
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(log_entry.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: operations.log -> operations.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
