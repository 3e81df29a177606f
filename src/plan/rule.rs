use std::collections::BTreeMap;

/// How a RemovePath pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Literal,
    Glob,
}

/// Where a ReplaceText rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    Message,
    Blob,
    Both,
}

/// Which commits a ShiftDate rule targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSelector {
    All,
    Hashes(Vec<String>),
}

/// How new commit dates are derived
#[derive(Debug, Clone, PartialEq)]
pub enum DatePolicy {
    /// Shift every selected commit by a fixed number of seconds
    Offset { seconds: i64 },
    /// Re-time commits into a daily window, e.g. 19:00-23:00
    Window {
        start_hour: u32,
        end_hour: u32,
        weekend_only: bool,
        preserve_order: bool,
    },
}

/// A primitive history transformation
///
/// Rules are immutable once compiled into a plan. The compiler normalizes
/// their order: SquashRange first (it needs live commit ids and plain-git
/// access to the tip), then RemovePath before any text-scoped rule so text
/// replacement never runs over content already slated for removal.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    RenameAuthor {
        match_email: String,
        new_name: Option<String>,
        new_email: Option<String>,
    },
    RemovePath {
        pattern: String,
        mode: PathMode,
    },
    /// Drop every blob larger than the threshold from all commits
    RemoveLargeBlobs {
        threshold_bytes: u64,
    },
    ReplaceText {
        pattern: String,
        replacement: String,
        scope: TextScope,
    },
    /// commit id -> replacement message; a single-commit rewrite is a
    /// one-entry table
    RewriteMessage {
        mappings: BTreeMap<String, String>,
    },
    ShiftDate {
        selector: CommitSelector,
        policy: DatePolicy,
    },
    SquashRange {
        from: String,
        to: String,
        new_message: String,
    },
}

impl Rule {
    /// Destructive rules force a backup unless the operator explicitly
    /// acknowledges the risk
    pub fn is_destructive(&self) -> bool {
        match self {
            Rule::RemovePath { .. } | Rule::RemoveLargeBlobs { .. } | Rule::SquashRange { .. } => {
                true
            }
            Rule::ReplaceText { scope, .. } => {
                matches!(scope, TextScope::Blob | TextScope::Both)
            }
            _ => false,
        }
    }

    /// Sort key establishing the normalized execution order
    pub(crate) fn order_key(&self) -> u8 {
        match self {
            Rule::SquashRange { .. } => 0,
            Rule::RemovePath { .. } => 1,
            Rule::RemoveLargeBlobs { .. } => 2,
            Rule::ReplaceText { .. } => 3,
            Rule::RenameAuthor { .. } => 4,
            Rule::RewriteMessage { .. } => 5,
            Rule::ShiftDate { .. } => 6,
        }
    }

    /// Short human-readable description for reports and audit logs
    pub fn describe(&self) -> String {
        match self {
            Rule::RenameAuthor { match_email, .. } => {
                format!("rename-author {}", match_email)
            }
            Rule::RemovePath { pattern, mode } => {
                let kind = match mode {
                    PathMode::Literal => "path",
                    PathMode::Glob => "glob",
                };
                format!("remove-{} {}", kind, pattern)
            }
            Rule::RemoveLargeBlobs { threshold_bytes } => {
                format!("remove-blobs-over {}B", threshold_bytes)
            }
            Rule::ReplaceText { pattern, scope, .. } => {
                let scope = match scope {
                    TextScope::Message => "messages",
                    TextScope::Blob => "blobs",
                    TextScope::Both => "messages+blobs",
                };
                format!("replace-text in {} ({})", scope, pattern)
            }
            Rule::RewriteMessage { mappings } => {
                format!("rewrite-message ({} commits)", mappings.len())
            }
            Rule::ShiftDate { selector, .. } => match selector {
                CommitSelector::All => "shift-date (all commits)".to_string(),
                CommitSelector::Hashes(hashes) => {
                    format!("shift-date ({} commits)", hashes.len())
                }
            },
            Rule::SquashRange { from, to, .. } => {
                format!("squash {}..{}", &from[..from.len().min(8)], &to[..to.len().min(8)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_rules() {
        assert!(Rule::RemovePath {
            pattern: "secrets.json".to_string(),
            mode: PathMode::Literal,
        }
        .is_destructive());

        assert!(Rule::RemoveLargeBlobs {
            threshold_bytes: 1_000_000,
        }
        .is_destructive());

        assert!(Rule::SquashRange {
            from: "a".to_string(),
            to: "b".to_string(),
            new_message: "m".to_string(),
        }
        .is_destructive());

        assert!(Rule::ReplaceText {
            pattern: "x".to_string(),
            replacement: "y".to_string(),
            scope: TextScope::Blob,
        }
        .is_destructive());

        assert!(!Rule::ReplaceText {
            pattern: "x".to_string(),
            replacement: "y".to_string(),
            scope: TextScope::Message,
        }
        .is_destructive());

        assert!(!Rule::RenameAuthor {
            match_email: "old@example.com".to_string(),
            new_name: Some("New".to_string()),
            new_email: None,
        }
        .is_destructive());
    }

    #[test]
    fn test_order_squash_first_remove_before_text() {
        let squash = Rule::SquashRange {
            from: "a".to_string(),
            to: "b".to_string(),
            new_message: "m".to_string(),
        };
        let remove = Rule::RemovePath {
            pattern: "p".to_string(),
            mode: PathMode::Literal,
        };
        let strip = Rule::RemoveLargeBlobs {
            threshold_bytes: 1024,
        };
        let replace = Rule::ReplaceText {
            pattern: "x".to_string(),
            replacement: "y".to_string(),
            scope: TextScope::Both,
        };

        assert!(squash.order_key() < remove.order_key());
        assert!(remove.order_key() < strip.order_key());
        assert!(strip.order_key() < replace.order_key());
    }

    #[test]
    fn test_describe() {
        let rule = Rule::RemovePath {
            pattern: "*.pem".to_string(),
            mode: PathMode::Glob,
        };
        assert_eq!(rule.describe(), "remove-glob *.pem");

        let rule = Rule::RemoveLargeBlobs {
            threshold_bytes: 500_000,
        };
        assert_eq!(rule.describe(), "remove-blobs-over 500000B");

        let rule = Rule::SquashRange {
            from: "0123456789abcdef".to_string(),
            to: "fedcba9876543210".to_string(),
            new_message: "m".to_string(),
        };
        assert_eq!(rule.describe(), "squash 01234567..fedcba98");
    }
}
