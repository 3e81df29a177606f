use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during AI provider operations
#[derive(Debug, Error)]
pub enum AiError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded, retry after {0}s")]
    RateLimitExceeded(u64),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Commit message style the provider is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Conventional,
    Gitmoji,
    Simple,
    Detailed,
}

impl MessageStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conventional" => Some(MessageStyle::Conventional),
            "gitmoji" => Some(MessageStyle::Gitmoji),
            "simple" => Some(MessageStyle::Simple),
            "detailed" => Some(MessageStyle::Detailed),
            _ => None,
        }
    }
}

/// Everything a provider gets to see about one commit
#[derive(Debug, Clone)]
pub struct CommitContext {
    pub original_message: String,
    pub commit_hash: String,
    pub files_changed: Vec<String>,
    pub diff_summary: Option<String>,
}

/// Trait for AI providers that can rewrite commit messages
#[async_trait]
pub trait MessageProvider: Send + Sync {
    /// Generate a replacement message for one commit
    async fn generate_message(
        &self,
        context: &CommitContext,
        style: MessageStyle,
    ) -> Result<String, AiError>;
}

fn style_instructions(style: MessageStyle) -> &'static str {
    match style {
        MessageStyle::Conventional => {
            "Use conventional commit format:\n\
             - feat: for new features\n\
             - fix: for bug fixes\n\
             - docs: for documentation\n\
             - style: for formatting\n\
             - refactor: for code refactoring\n\
             - test: for tests\n\
             - chore: for maintenance\n\
             \n\
             Example: \"feat: add user authentication\""
        }
        MessageStyle::Gitmoji => {
            "Use gitmoji format with emoji at the start:\n\
             - :sparkles: for new features\n\
             - :bug: for bug fixes\n\
             - :memo: for documentation\n\
             - :art: for formatting\n\
             - :recycle: for refactoring\n\
             - :white_check_mark: for tests\n\
             \n\
             Example: \":sparkles: add user authentication\""
        }
        MessageStyle::Simple => {
            "Write a short, clear commit message (max 50 chars).\n\
             Use imperative mood (e.g., \"Add\" not \"Added\").\n\
             \n\
             Example: \"Add user authentication\""
        }
        MessageStyle::Detailed => {
            "Write a detailed commit message with:\n\
             1. Subject line (max 50 chars, imperative mood)\n\
             2. Blank line\n\
             3. Body explaining what and why"
        }
    }
}

/// Build the rewrite prompt for one commit
pub fn build_prompt(context: &CommitContext, style: MessageStyle) -> String {
    let mut files_info = String::new();
    if !context.files_changed.is_empty() {
        let shown: Vec<&str> = context
            .files_changed
            .iter()
            .take(10)
            .map(String::as_str)
            .collect();
        files_info = format!("\nFiles changed: {}", shown.join(", "));
        if context.files_changed.len() > 10 {
            files_info.push_str(&format!(" (+{} more)", context.files_changed.len() - 10));
        }
    }

    let mut diff_info = String::new();
    if let Some(summary) = &context.diff_summary {
        let truncated: String = summary.chars().take(500).collect();
        diff_info = format!("\nDiff summary:\n{}", truncated);
    }

    format!(
        "You are a git commit message writer. Rewrite the following commit message \
         to be clearer and more descriptive.\n\
         \n\
         {}\n\
         \n\
         Original commit message: \"{}\"\n\
         {}{}\n\
         \n\
         Respond with ONLY the new commit message, nothing else. \
         Do not include quotes around the message.",
        style_instructions(style),
        context.original_message,
        files_info,
        diff_info
    )
}

const CONVENTIONAL_PREFIXES: &[&str] = &[
    "feat:", "fix:", "docs:", "style:", "refactor:", "test:", "chore:", "perf:", "ci:", "build:",
    "revert:",
];

/// Clean up a provider response and enforce the requested style
///
/// Strips markdown fences and surrounding quotes; a conventional-style
/// message missing a type prefix gets `chore:` rather than being rejected.
pub fn clean_response(response: &str, style: MessageStyle) -> String {
    let mut cleaned = response.trim();

    if cleaned.starts_with("```") {
        if let Some(first_newline) = cleaned.find('\n') {
            cleaned = &cleaned[first_newline + 1..];
        }
        if let Some(last_backticks) = cleaned.rfind("```") {
            cleaned = &cleaned[..last_backticks];
        }
        cleaned = cleaned.trim();
    }

    let message = cleaned.trim_matches(|c| c == '"' || c == '\'').to_string();

    if style == MessageStyle::Conventional {
        let lower = message.to_lowercase();
        let has_prefix = CONVENTIONAL_PREFIXES.iter().any(|p| lower.starts_with(p));
        if !has_prefix && !message.is_empty() {
            return format!("chore: {}", message);
        }
    }

    message
}
