//! Plan execution with the backup-before-mutate guarantee
//!
//! Execution order is structural: lock, stale-plan check, backup, engine,
//! and on engine failure an automatic rollback to the backup just taken.
//! Precondition failures return an Err before anything mutates; once the
//! engine has run, the result is reported through `Outcome` instead.

use crate::audit::AuditLogger;
use crate::backup::{BackupManager, BackupRecord};
use crate::config::Config;
use crate::engine::filter_repo;
use crate::engine::rule_matches;
use crate::engine::simulator::{DryRunReport, DryRunSimulator};
use crate::error::GitError;
use crate::git::repository::Repository;
use crate::plan::compiler::Plan;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

const LOCK_FILE: &str = "resculpt.lock";

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Repository is busy: another rewrite holds the lock at {0}")]
    RepositoryBusy(PathBuf),

    #[error("Plan is stale: compiled against {expected} but head is now {actual}")]
    StalePlan { expected: String, actual: String },

    #[error("Backup creation failed, nothing was modified: {0}")]
    BackupFailed(String),

    #[error("Git error: {0}")]
    Git(#[from] GitError),
}

/// Advisory per-repository lock held for the duration of an execution
///
/// Lives inside .git so it travels with the repository and never pollutes
/// the working tree. Released on drop, including on panic unwind.
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    pub fn acquire(repo: &Repository) -> Result<Self, ExecutionError> {
        let path = repo.path().join(".git").join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ExecutionError::RepositoryBusy(repo.path().to_path_buf()))
            }
            Err(e) => Err(ExecutionError::Git(GitError::IoError(e))),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Terminal state of an execution attempt
#[derive(Debug)]
pub enum Outcome {
    Succeeded,
    DryRun(DryRunReport),
    /// Engine failed; the repository was rolled back to the backup
    Failed { error: String },
    /// Engine failed and the rollback failed too; the backup branch still
    /// holds the pre-image for manual recovery
    PartialFailure {
        error: String,
        rollback_error: String,
    },
}

/// Match count for one rule, measured against the pre-image
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule: String,
    pub matched: usize,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub outcome: Outcome,
    pub backup: Option<BackupRecord>,
    pub rule_outcomes: Vec<RuleOutcome>,
    pub commits_before: usize,
    pub commits_after: Option<usize>,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded | Outcome::DryRun(_))
    }
}

/// Executes compiled plans against their repository
pub struct RewriteExecutor {
    audit: Option<AuditLogger>,
}

impl RewriteExecutor {
    pub fn new() -> Self {
        Self { audit: None }
    }

    /// Record executions, backups and rollbacks in the operation log.
    /// Logging failures never interfere with the rewrite itself.
    pub fn with_audit(logger: AuditLogger) -> Self {
        Self {
            audit: Some(logger),
        }
    }

    /// Build an executor from the user's configuration: audit logging is
    /// attached when operation logging is enabled
    pub fn from_config(config: &Config) -> Self {
        let audit = if config.behavior.log_operations {
            AuditLogger::new().ok()
        } else {
            None
        };
        Self { audit }
    }

    fn check_pre_image(repo: &Repository, plan: &Plan) -> Result<(), ExecutionError> {
        let head = repo.head_commit()?;
        if head != plan.pre_image() {
            return Err(ExecutionError::StalePlan {
                expected: plan.pre_image().to_string(),
                actual: head,
            });
        }
        Ok(())
    }

    pub fn execute(&self, plan: &Plan) -> Result<ExecutionResult, ExecutionError> {
        let repo = Repository::open(plan.repo_path()).map_err(ExecutionError::Git)?;

        // Simulation runs entirely against a clone, so it never needs the
        // lock and proceeds even while another rewrite is in flight.
        if plan.dry_run() {
            Self::check_pre_image(&repo, plan)?;
            let report = DryRunSimulator::new().simulate(plan)?;
            let commits_before = report.commits_before;
            let commits_after = report.commits_after;
            return Ok(ExecutionResult {
                plan_id: plan.id().to_string(),
                outcome: Outcome::DryRun(report),
                backup: None,
                rule_outcomes: Vec::new(),
                commits_before,
                commits_after: Some(commits_after),
            });
        }

        let _lock = RepoLock::acquire(&repo)?;
        Self::check_pre_image(&repo, plan)?;

        // Match counts come from the pre-image; after the rewrite the
        // evidence is gone.
        let mut rule_outcomes = Vec::with_capacity(plan.rules().len());
        for rule in plan.rules() {
            rule_outcomes.push(RuleOutcome {
                rule: rule.describe(),
                matched: rule_matches(&repo, rule)?,
            });
        }
        let commits_before = repo.commits_from("HEAD", None)?.len();

        let backup = if plan.requires_backup() {
            let manager = BackupManager::new(repo.clone());
            let record = manager
                .create(&format!("plan-{}", plan.id()))
                .map_err(|e| ExecutionError::BackupFailed(e.to_string()))?;
            if let Some(audit) = &self.audit {
                let _ = audit.log_backup(&record.ref_name, &record.commit, repo.path());
            }
            Some(record)
        } else {
            None
        };

        match filter_repo::apply(&repo, plan.rules()) {
            Ok(()) => {
                let commits_after = repo.commits_from("HEAD", None)?.len();
                if let Some(audit) = &self.audit {
                    let _ = audit.log_execution(&plan.summary(), repo.path(), "succeeded");
                }
                Ok(ExecutionResult {
                    plan_id: plan.id().to_string(),
                    outcome: Outcome::Succeeded,
                    backup,
                    rule_outcomes,
                    commits_before,
                    commits_after: Some(commits_after),
                })
            }
            Err(engine_error) => {
                let outcome = match &backup {
                    Some(record) => {
                        let manager = BackupManager::new(repo.clone());
                        match manager.restore(record, true) {
                            Ok(()) => {
                                if let Some(audit) = &self.audit {
                                    let _ =
                                        audit.log_restore(&record.ref_name, repo.path(), true);
                                }
                                Outcome::Failed {
                                    error: engine_error.to_string(),
                                }
                            }
                            Err(rollback_error) => Outcome::PartialFailure {
                                error: engine_error.to_string(),
                                rollback_error: rollback_error.to_string(),
                            },
                        }
                    }
                    None => Outcome::Failed {
                        error: engine_error.to_string(),
                    },
                };
                if let Some(audit) = &self.audit {
                    let label = match &outcome {
                        Outcome::PartialFailure { .. } => "partial-failure",
                        _ => "failed",
                    };
                    let _ = audit.log_execution(&plan.summary(), repo.path(), label);
                }
                Ok(ExecutionResult {
                    plan_id: plan.id().to_string(),
                    outcome,
                    backup,
                    rule_outcomes,
                    commits_before,
                    commits_after: None,
                })
            }
        }
    }
}

impl Default for RewriteExecutor {
    fn default() -> Self {
        Self::new()
    }
}
