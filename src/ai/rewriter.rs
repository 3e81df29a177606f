//! Batch commit message rewriting
//!
//! Turns provider output into the commit-id -> message mappings a
//! rewrite-message rule consumes. Provider failures degrade per commit:
//! the original message is kept and the failure is reported, so one flaky
//! API call never aborts a whole batch.

use crate::ai::client::{CommitContext, MessageProvider, MessageStyle};
use crate::analyzer;
use crate::error::GitResult;
use crate::git::repository::Repository;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    /// commit id -> replacement message, ready for a rewrite-message rule
    pub mappings: BTreeMap<String, String>,
    /// Commits whose message the provider left as-is
    pub unchanged: usize,
    /// commit id paired with the provider error, originals kept
    pub failures: Vec<(String, String)>,
}

pub struct MessageRewriter {
    provider: Box<dyn MessageProvider>,
    style: MessageStyle,
}

impl MessageRewriter {
    pub fn new(provider: Box<dyn MessageProvider>, style: MessageStyle) -> Self {
        Self { provider, style }
    }

    /// Ask the provider for a new message for each commit, newest first
    pub async fn rewrite(
        &self,
        repo: &Repository,
        max_count: Option<usize>,
    ) -> GitResult<RewriteOutcome> {
        let commits = repo.commits_from("HEAD", max_count)?;
        let mut outcome = RewriteOutcome::default();

        for entry in commits {
            let details = analyzer::commit_details(repo, &entry.hash)?;
            let context = CommitContext {
                original_message: details.message.clone(),
                commit_hash: details.hash.clone(),
                files_changed: details.files,
                diff_summary: None,
            };

            match self.provider.generate_message(&context, self.style).await {
                Ok(message) if message != details.message => {
                    outcome.mappings.insert(details.hash, message);
                }
                Ok(_) => outcome.unchanged += 1,
                Err(e) => outcome.failures.push((details.hash, e.to_string())),
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::AiError;
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider returning canned responses, one per call
    struct MockProvider {
        responses: Mutex<Vec<Result<String, AiError>>>,
    }

    impl MockProvider {
        fn new(responses: Vec<Result<String, AiError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl MessageProvider for MockProvider {
        async fn generate_message(
            &self,
            context: &CommitContext,
            _style: MessageStyle,
        ) -> Result<String, AiError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(context.original_message.clone());
            }
            responses.remove(0)
        }
    }

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

    #[tokio::test]
    async fn test_rewrite_builds_mappings() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "wip");
        create_commit(&repo_path, "b.txt", "two", "more wip");
        let repo = Repository::open(&repo_path).unwrap();

        let provider = MockProvider::new(vec![
            Ok("feat: add b".to_string()),
            Ok("feat: add a".to_string()),
        ]);
        let rewriter = MessageRewriter::new(Box::new(provider), MessageStyle::Conventional);

        let outcome = rewriter.rewrite(&repo, None).await.unwrap();
        assert_eq!(outcome.mappings.len(), 2);
        assert!(outcome.failures.is_empty());

        let head = repo.head_commit().unwrap();
        assert_eq!(outcome.mappings.get(&head), Some(&"feat: add b".to_string()));
    }

    #[tokio::test]
    async fn test_rewrite_keeps_original_on_failure() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");
        create_commit(&repo_path, "b.txt", "two", "second");
        let repo = Repository::open(&repo_path).unwrap();

        let provider = MockProvider::new(vec![
            Err(AiError::ApiError("boom".to_string())),
            Ok("feat: add a".to_string()),
        ]);
        let rewriter = MessageRewriter::new(Box::new(provider), MessageStyle::Conventional);

        let outcome = rewriter.rewrite(&repo, None).await.unwrap();
        assert_eq!(outcome.mappings.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, repo.head_commit().unwrap());
    }

    #[tokio::test]
    async fn test_rewrite_skips_unchanged_messages() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "feat: already good");
        let repo = Repository::open(&repo_path).unwrap();

        let provider = MockProvider::new(vec![Ok("feat: already good".to_string())]);
        let rewriter = MessageRewriter::new(Box::new(provider), MessageStyle::Conventional);

        let outcome = rewriter.rewrite(&repo, None).await.unwrap();
        assert!(outcome.mappings.is_empty());
        assert_eq!(outcome.unchanged, 1);
    }

    #[tokio::test]
    async fn test_rewrite_respects_max_count() {
        let (_temp, repo_path) = create_test_repo();
        create_commit(&repo_path, "a.txt", "one", "first");
        create_commit(&repo_path, "b.txt", "two", "second");
        create_commit(&repo_path, "c.txt", "three", "third");
        let repo = Repository::open(&repo_path).unwrap();

        let provider = MockProvider::new(vec![Ok("feat: rewritten".to_string())]);
        let rewriter = MessageRewriter::new(Box::new(provider), MessageStyle::Conventional);

        let outcome = rewriter.rewrite(&repo, Some(1)).await.unwrap();
        assert_eq!(outcome.mappings.len(), 1);
        assert!(outcome.mappings.contains_key(&repo.head_commit().unwrap()));
    }
}
