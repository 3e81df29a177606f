pub mod executor;
pub mod filter_repo;
pub mod simulator;

pub use executor::{ExecutionError, ExecutionResult, Outcome, RepoLock, RewriteExecutor, RuleOutcome};
pub use simulator::{DryRunReport, DryRunSimulator, RuleReport};

use crate::analyzer;
use crate::error::GitResult;
use crate::git::repository::Repository;
use crate::plan::rule::{CommitSelector, Rule};

/// Count how many commits or files a rule would touch, measured against
/// the repository's current state
pub(crate) fn rule_matches(repo: &Repository, rule: &Rule) -> GitResult<usize> {
    match rule {
        Rule::RenameAuthor { match_email, .. } => Ok(repo
            .commits_from("HEAD", None)?
            .iter()
            .filter(|c| &c.author_email == match_email)
            .count()),

        Rule::RemovePath { pattern, .. } => analyzer::commits_touching_path(repo, pattern),

        Rule::RemoveLargeBlobs { threshold_bytes } => {
            let output = repo.executor().run_unchecked(&[
                "cat-file",
                "--batch-all-objects",
                "--batch-check=%(objecttype) %(objectsize)",
            ])?;
            if !output.success {
                return Ok(0);
            }
            Ok(output
                .stdout
                .lines()
                .filter_map(|line| line.strip_prefix("blob "))
                .filter_map(|size| size.trim().parse::<u64>().ok())
                .filter(|size| size > threshold_bytes)
                .count())
        }

        Rule::ReplaceText { pattern, .. } => {
            // Files at head containing the pattern; historical-only matches
            // are not counted but are still rewritten.
            let output =
                repo.executor()
                    .run_unchecked(&["grep", "-l", "--fixed-strings", pattern, "HEAD"])?;
            if !output.success {
                return Ok(0);
            }
            Ok(output.stdout.lines().filter(|l| !l.is_empty()).count())
        }

        Rule::RewriteMessage { mappings } => Ok(mappings.len()),

        Rule::ShiftDate { selector, .. } => match selector {
            CommitSelector::All => Ok(repo.commits_from("HEAD", None)?.len()),
            CommitSelector::Hashes(hashes) => Ok(hashes.len()),
        },

        Rule::SquashRange { from, to, .. } => repo.count_range(from, to),
    }
}
