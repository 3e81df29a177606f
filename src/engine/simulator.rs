//! Dry-run by real execution against a throwaway clone
//!
//! Estimating a rewrite's effect is unreliable; running it is not. The
//! simulator clones the repository into a temp directory, applies the plan
//! there for real, and measures the difference. The clone is removed when
//! the TempDir guard drops, on success and on error alike.

use crate::engine::filter_repo;
use crate::engine::rule_matches;
use crate::error::{GitError, GitResult};
use crate::git::repository::Repository;
use crate::plan::compiler::Plan;
use crate::plan::rule::{CommitSelector, PathMode, Rule};
use tempfile::TempDir;

use super::executor::ExecutionError;

/// Predicted effect of one rule
///
/// `example_before` and `example_after` show one concrete value the rule
/// would change (a message, an author string, a path), sampled from the
/// clone before the rewrite runs. Either side may be absent when the rule
/// matched nothing or the result is not knowable up front.
#[derive(Debug, Clone)]
pub struct RuleReport {
    pub rule: String,
    pub matched: usize,
    pub destructive: bool,
    pub example_before: Option<String>,
    pub example_after: Option<String>,
}

/// What a plan would do, measured on a clone
#[derive(Debug)]
pub struct DryRunReport {
    pub plan_id: String,
    pub rule_reports: Vec<RuleReport>,
    pub commits_before: usize,
    pub commits_after: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl DryRunReport {
    pub fn bytes_freed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    pub fn commits_rewritten(&self) -> usize {
        self.commits_before.saturating_sub(self.commits_after)
    }
}

pub struct DryRunSimulator;

impl DryRunSimulator {
    pub fn new() -> Self {
        Self
    }

    pub fn simulate(&self, plan: &Plan) -> Result<DryRunReport, ExecutionError> {
        let needs_engine = plan
            .rules()
            .iter()
            .any(|r| !matches!(r, Rule::SquashRange { .. }));
        if needs_engine && !filter_repo::is_available() {
            return Err(ExecutionError::Git(GitError::EngineMissing(
                "git-filter-repo is not installed. Install with: pip install git-filter-repo"
                    .to_string(),
            )));
        }

        let source = Repository::open(plan.repo_path()).map_err(ExecutionError::Git)?;

        let scratch = TempDir::new().map_err(GitError::IoError)?;
        let clone_path = scratch.path().join("clone");
        let source_str = source.path().to_string_lossy().into_owned();
        let clone_str = clone_path.to_string_lossy().into_owned();
        source
            .executor()
            .run_with_timeout(
                &["clone", &source_str, &clone_str],
                source.executor().long_timeout(),
            )
            .map_err(ExecutionError::Git)?;

        let clone = Repository::open(&clone_path).map_err(ExecutionError::Git)?;

        // A fresh clone does not inherit the source's local identity, and
        // the squash phase needs one to commit.
        for key in ["user.name", "user.email"] {
            let value = source.executor().run_unchecked(&["config", key])?;
            if value.success {
                clone
                    .executor()
                    .run(&["config", key, value.stdout.trim()])?;
            }
        }

        let mut rule_reports = Vec::with_capacity(plan.rules().len());
        for rule in plan.rules() {
            let (example_before, example_after) = rule_example(&clone, rule)?;
            rule_reports.push(RuleReport {
                rule: rule.describe(),
                matched: rule_matches(&clone, rule)?,
                destructive: rule.is_destructive(),
                example_before,
                example_after,
            });
        }

        let commits_before = clone.commits_from("HEAD", None)?.len();
        let bytes_before = clone.object_store_size()?;

        filter_repo::apply(&clone, plan.rules())?;

        let commits_after = clone.commits_from("HEAD", None)?.len();
        let bytes_after = clone.object_store_size()?;

        Ok(DryRunReport {
            plan_id: plan.id().to_string(),
            rule_reports,
            commits_before,
            commits_after,
            bytes_before,
            bytes_after,
        })
    }
}

impl Default for DryRunSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample one concrete value a rule would change, with its replacement
/// where the rule determines it
///
/// Reads the clone's pre-rewrite state. Rules with randomized output
/// (date windows) report only the before side.
fn rule_example(repo: &Repository, rule: &Rule) -> GitResult<(Option<String>, Option<String>)> {
    match rule {
        Rule::RenameAuthor {
            match_email,
            new_name,
            new_email,
        } => {
            let hit = repo
                .commits_from("HEAD", None)?
                .into_iter()
                .find(|c| &c.author_email == match_email);
            match hit {
                Some(entry) => {
                    let name = new_name
                        .clone()
                        .unwrap_or_else(|| entry.author_name.clone());
                    let email = new_email.clone().unwrap_or_else(|| match_email.clone());
                    Ok((Some(entry.author()), Some(format!("{} <{}>", name, email))))
                }
                None => Ok((None, None)),
            }
        }

        Rule::RemovePath { pattern, mode } => {
            let files = crate::analyzer::list_all_files(repo)?;
            let example = match mode {
                PathMode::Literal => files.get(pattern).cloned(),
                PathMode::Glob => glob::Pattern::new(pattern)
                    .ok()
                    .and_then(|g| files.iter().find(|f| g.matches(f)).cloned()),
            };
            Ok((example, None))
        }

        Rule::RemoveLargeBlobs { threshold_bytes } => {
            let output = repo
                .executor()
                .run_unchecked(&["ls-tree", "-r", "-l", "HEAD"])?;
            if !output.success {
                return Ok((None, None));
            }
            let example = output.stdout.lines().find_map(|line| {
                let (meta, path) = line.split_once('\t')?;
                let size = meta.split_whitespace().nth(3)?.parse::<u64>().ok()?;
                (size > *threshold_bytes).then(|| format!("{} ({}B)", path, size))
            });
            Ok((example, None))
        }

        Rule::ReplaceText {
            pattern,
            replacement,
            ..
        } => Ok((Some(pattern.clone()), Some(replacement.clone()))),

        Rule::RewriteMessage { mappings } => match mappings.iter().next() {
            Some((commit, new_message)) => {
                let before = repo
                    .commits_from(commit, Some(1))?
                    .into_iter()
                    .next()
                    .map(|c| c.message);
                Ok((before, Some(new_message.clone())))
            }
            None => Ok((None, None)),
        },

        Rule::ShiftDate { selector, .. } => {
            let commits = repo.commits_from("HEAD", None)?;
            let entry = match selector {
                CommitSelector::All => commits.first(),
                CommitSelector::Hashes(hashes) => {
                    commits.iter().find(|c| hashes.contains(&c.hash))
                }
            };
            Ok((entry.map(|c| c.date.clone()), None))
        }

        Rule::SquashRange {
            from,
            to,
            new_message,
        } => {
            let count = repo.count_range(from, to)?;
            Ok((
                Some(format!("{} commits", count)),
                Some(new_message.clone()),
            ))
        }
    }
}
