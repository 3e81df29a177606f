use crate::analyzer;
use crate::config::Config;
use crate::error::GitError;
use crate::git::repository::Repository;
use crate::plan::rule::{CommitSelector, DatePolicy, PathMode, Rule};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Plan contains no rules")]
    EmptyPlan,

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Conflicting rules: {0}")]
    ConflictingRules(String),

    #[error("Git error: {0}")]
    Git(#[from] GitError),
}

/// Caller intent for a compilation
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub dry_run: bool,
    /// Skip the pre-execution backup for non-destructive plans
    pub waive_backup: bool,
    /// Required in addition to `waive_backup` when the plan contains
    /// destructive rules
    pub acknowledge_risk: bool,
}

impl CompileOptions {
    /// Defaults drawn from the user's configuration; risk acknowledgement
    /// is always an explicit per-plan choice
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.behavior.default_dry_run,
            waive_backup: !config.behavior.auto_backup,
            acknowledge_risk: false,
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            waive_backup: false,
            acknowledge_risk: false,
        }
    }
}

/// A validated, ordered, immutable transformation plan
///
/// Compiled exactly once; afterwards it is read-only evidence of what will
/// be (or was) executed. The recorded pre-image head lets the executor
/// detect stale plans whose target history has moved.
#[derive(Debug, Clone)]
pub struct Plan {
    id: String,
    repo_path: PathBuf,
    rules: Vec<Rule>,
    dry_run: bool,
    requires_backup: bool,
    pre_image: String,
    created_at: DateTime<Utc>,
}

impl Plan {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn requires_backup(&self) -> bool {
        self.requires_backup
    }

    /// Head commit hash the plan was compiled against
    pub fn pre_image(&self) -> &str {
        &self.pre_image
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// One-line summary for audit logging
    pub fn summary(&self) -> String {
        let rules: Vec<String> = self.rules.iter().map(|r| r.describe()).collect();
        format!("plan {} [{}]", self.id, rules.join(", "))
    }
}

/// Compiles requested rules into validated plans
///
/// Pure computation plus read-only inspection; never mutates the repository.
pub struct PlanCompiler;

impl PlanCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(
        &self,
        repo: &Repository,
        rules: Vec<Rule>,
        options: CompileOptions,
    ) -> Result<Plan, CompileError> {
        if rules.is_empty() {
            return Err(CompileError::EmptyPlan);
        }

        let pre_image = repo.head_commit().map_err(|_| {
            CompileError::UnknownReference("repository has no commits".to_string())
        })?;

        let all_files = analyzer::list_all_files(repo)?;
        let snapshot = analyzer::analyze(repo)?;

        // Normalize commit references to full hashes while validating shapes
        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            normalized.push(self.validate_rule(repo, rule, &all_files, &snapshot, &pre_image)?);
        }

        self.check_conflicts(repo, &normalized)?;

        let destructive = normalized.iter().any(Rule::is_destructive);
        let requires_backup = if destructive {
            !(options.waive_backup && options.acknowledge_risk)
        } else {
            !options.waive_backup
        };

        // Stable sort preserves relative order of same-kind rules
        normalized.sort_by_key(Rule::order_key);

        Ok(Plan {
            id: format!("{:08x}", rand::random::<u32>()),
            repo_path: repo.path().to_path_buf(),
            rules: normalized,
            dry_run: options.dry_run,
            requires_backup,
            pre_image,
            created_at: Utc::now(),
        })
    }

    fn validate_rule(
        &self,
        repo: &Repository,
        rule: Rule,
        all_files: &BTreeSet<String>,
        snapshot: &analyzer::HistorySnapshot,
        pre_image: &str,
    ) -> Result<Rule, CompileError> {
        match rule {
            Rule::RenameAuthor {
                match_email,
                new_name,
                new_email,
            } => {
                if match_email.trim().is_empty() {
                    return Err(CompileError::InvalidRule(
                        "rename-author requires a match email".to_string(),
                    ));
                }
                let has_name = new_name.as_deref().is_some_and(|n| !n.trim().is_empty());
                let has_email = new_email.as_deref().is_some_and(|e| !e.trim().is_empty());
                if !has_name && !has_email {
                    return Err(CompileError::InvalidRule(
                        "rename-author requires a new name or a new email".to_string(),
                    ));
                }
                let known = snapshot
                    .commits
                    .iter()
                    .any(|c| c.author_email == match_email);
                if !known {
                    return Err(CompileError::UnknownReference(format!(
                        "no commits authored by {}",
                        match_email
                    )));
                }
                Ok(Rule::RenameAuthor {
                    match_email,
                    new_name: new_name.filter(|n| !n.trim().is_empty()),
                    new_email: new_email.filter(|e| !e.trim().is_empty()),
                })
            }

            Rule::RemovePath { pattern, mode } => {
                if pattern.trim().is_empty() {
                    return Err(CompileError::InvalidRule(
                        "remove-path requires a non-empty pattern".to_string(),
                    ));
                }
                match mode {
                    PathMode::Literal => {
                        if !all_files.contains(&pattern) {
                            return Err(CompileError::UnknownReference(format!(
                                "path never existed in history: {}",
                                pattern
                            )));
                        }
                    }
                    PathMode::Glob => {
                        let glob = glob::Pattern::new(&pattern).map_err(|e| {
                            CompileError::InvalidRule(format!("bad glob '{}': {}", pattern, e))
                        })?;
                        if !all_files.iter().any(|f| glob.matches(f)) {
                            return Err(CompileError::UnknownReference(format!(
                                "glob matches no path in history: {}",
                                pattern
                            )));
                        }
                    }
                }
                Ok(Rule::RemovePath { pattern, mode })
            }

            Rule::RemoveLargeBlobs { threshold_bytes } => {
                if threshold_bytes == 0 {
                    return Err(CompileError::InvalidRule(
                        "remove-large-blobs requires a positive size threshold".to_string(),
                    ));
                }
                Ok(Rule::RemoveLargeBlobs { threshold_bytes })
            }

            Rule::ReplaceText {
                pattern,
                replacement,
                scope,
            } => {
                if pattern.is_empty() {
                    return Err(CompileError::InvalidRule(
                        "replace-text requires a non-empty pattern".to_string(),
                    ));
                }
                Ok(Rule::ReplaceText {
                    pattern,
                    replacement,
                    scope,
                })
            }

            Rule::RewriteMessage { mappings } => {
                if mappings.is_empty() {
                    return Err(CompileError::InvalidRule(
                        "rewrite-message requires at least one mapping".to_string(),
                    ));
                }
                let mut resolved_map = BTreeMap::new();
                for (commit_id, message) in mappings {
                    let resolved = self.resolve(repo, &commit_id)?;
                    resolved_map.insert(resolved, message);
                }
                Ok(Rule::RewriteMessage {
                    mappings: resolved_map,
                })
            }

            Rule::ShiftDate { selector, policy } => {
                match &policy {
                    DatePolicy::Offset { .. } => {}
                    DatePolicy::Window {
                        start_hour,
                        end_hour,
                        ..
                    } => {
                        if *start_hour > 23 || *end_hour > 23 {
                            return Err(CompileError::InvalidRule(format!(
                                "date window hours out of range: {}-{}",
                                start_hour, end_hour
                            )));
                        }
                    }
                }
                let selector = match selector {
                    CommitSelector::All => CommitSelector::All,
                    CommitSelector::Hashes(hashes) => {
                        if hashes.is_empty() {
                            return Err(CompileError::InvalidRule(
                                "shift-date selector lists no commits".to_string(),
                            ));
                        }
                        let mut resolved = Vec::with_capacity(hashes.len());
                        for hash in hashes {
                            resolved.push(self.resolve(repo, &hash)?);
                        }
                        CommitSelector::Hashes(resolved)
                    }
                };
                Ok(Rule::ShiftDate { selector, policy })
            }

            Rule::SquashRange {
                from,
                to,
                new_message,
            } => {
                if new_message.trim().is_empty() {
                    return Err(CompileError::InvalidRule(
                        "squash requires a new message".to_string(),
                    ));
                }
                let from = self.resolve(repo, &from)?;
                let to = self.resolve(repo, &to)?;
                if from == to {
                    return Err(CompileError::InvalidRule(
                        "squash range is empty (from == to)".to_string(),
                    ));
                }
                if !repo.is_ancestor(&from, &to)? {
                    return Err(CompileError::InvalidRule(format!(
                        "{} is not an ancestor of {}",
                        &from[..8],
                        &to[..8]
                    )));
                }
                // Squashing works by soft-resetting the branch tip, so the
                // range must end at the head this plan was compiled against.
                if to != pre_image {
                    return Err(CompileError::InvalidRule(
                        "squash range must end at the current head".to_string(),
                    ));
                }
                Ok(Rule::SquashRange {
                    from,
                    to,
                    new_message,
                })
            }
        }
    }

    fn resolve(&self, repo: &Repository, rev: &str) -> Result<String, CompileError> {
        repo.resolve_commit(rev)?
            .ok_or_else(|| CompileError::UnknownReference(format!("unknown commit: {}", rev)))
    }

    fn check_conflicts(&self, repo: &Repository, rules: &[Rule]) -> Result<(), CompileError> {
        let mut squashed: BTreeSet<String> = BTreeSet::new();
        let mut squash_count = 0;

        for rule in rules {
            if let Rule::SquashRange { from, to, .. } = rule {
                squash_count += 1;
                if squash_count > 1 {
                    // Every squash range must end at head, so two of them
                    // necessarily overlap.
                    return Err(CompileError::ConflictingRules(
                        "multiple squash ranges target the same tip".to_string(),
                    ));
                }
                let range = format!("{}..{}", from, to);
                let output = repo.executor().run(&["rev-list", &range])?;
                squashed.extend(
                    output
                        .stdout
                        .lines()
                        .filter(|l| !l.is_empty())
                        .map(|l| l.to_string()),
                );
            }
        }

        let mut message_targets: BTreeSet<&str> = BTreeSet::new();
        for rule in rules {
            match rule {
                Rule::RewriteMessage { mappings } => {
                    for commit in mappings.keys() {
                        if squashed.contains(commit) {
                            return Err(CompileError::ConflictingRules(format!(
                                "commit {} is both squashed and message-rewritten",
                                &commit[..8]
                            )));
                        }
                        if !message_targets.insert(commit) {
                            return Err(CompileError::ConflictingRules(format!(
                                "commit {} targeted by multiple message rewrites",
                                &commit[..8]
                            )));
                        }
                    }
                }
                Rule::ShiftDate {
                    selector: CommitSelector::Hashes(hashes),
                    ..
                } => {
                    for commit in hashes {
                        if squashed.contains(commit) {
                            return Err(CompileError::ConflictingRules(format!(
                                "commit {} is both squashed and date-shifted",
                                &commit[..8]
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl Default for PlanCompiler {
    fn default() -> Self {
        Self::new()
    }
}
