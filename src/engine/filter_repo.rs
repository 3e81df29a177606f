//! Translation from plan rules to a single `git filter-repo` invocation
//!
//! The engine is driven entirely through its command line: path filters as
//! arguments, text and author rewrites as temp files, and per-commit
//! message/date changes as a generated `--commit-callback` script keyed by
//! original commit id. Squash rules never reach the engine; they run as a
//! plain-git phase before it so ancestor commit ids stay stable.

use crate::error::{GitError, GitResult};
use crate::git::parser::CommitEntry;
use crate::git::repository::Repository;
use crate::plan::rule::{CommitSelector, DatePolicy, Rule, TextScope};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

/// Check whether the git-filter-repo engine is installed
pub fn is_available() -> bool {
    Command::new("git")
        .args(["filter-repo", "--version"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A fully prepared engine invocation
///
/// Holds the temp files the arguments reference; they are deleted when the
/// invocation is dropped, so it must outlive the engine run.
pub struct EngineInvocation {
    args: Vec<String>,
    _temp_files: Vec<NamedTempFile>,
}

impl EngineInvocation {
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Build the engine invocation for all non-squash rules
///
/// Returns None when nothing is left for the engine (squash-only plans).
/// Only the current branch is rewritten; backup branches keep the original
/// history they were created to protect.
pub fn translate(repo: &Repository, rules: &[Rule]) -> GitResult<Option<EngineInvocation>> {
    let mut args: Vec<String> = Vec::new();
    let mut temp_files: Vec<NamedTempFile> = Vec::new();

    let mut text_expressions = String::new();
    let mut message_expressions = String::new();
    let mut mailmap = String::new();
    let mut message_map: BTreeMap<String, String> = BTreeMap::new();
    let mut date_map: BTreeMap<String, i64> = BTreeMap::new();

    for rule in rules {
        match rule {
            Rule::SquashRange { .. } => {}

            Rule::RemovePath { pattern, mode } => {
                let flag = match mode {
                    crate::plan::rule::PathMode::Literal => "--path",
                    crate::plan::rule::PathMode::Glob => "--path-glob",
                };
                args.push(flag.to_string());
                args.push(pattern.clone());
                args.push("--invert-paths".to_string());
            }

            Rule::RemoveLargeBlobs { threshold_bytes } => {
                args.push("--strip-blobs-bigger-than".to_string());
                args.push(threshold_bytes.to_string());
            }

            Rule::ReplaceText {
                pattern,
                replacement,
                scope,
            } => {
                let line = format!("regex:{}==>{}\n", regex::escape(pattern), replacement);
                match scope {
                    TextScope::Blob => text_expressions.push_str(&line),
                    TextScope::Message => message_expressions.push_str(&line),
                    TextScope::Both => {
                        text_expressions.push_str(&line);
                        message_expressions.push_str(&line);
                    }
                }
            }

            Rule::RenameAuthor {
                match_email,
                new_name,
                new_email,
            } => {
                let line = match (new_name, new_email) {
                    (Some(name), Some(email)) => {
                        format!("{} <{}> <{}>\n", name, email, match_email)
                    }
                    (Some(name), None) => format!("{} <{}>\n", name, match_email),
                    (None, Some(email)) => format!("<{}> <{}>\n", email, match_email),
                    (None, None) => continue,
                };
                mailmap.push_str(&line);
            }

            Rule::RewriteMessage { mappings } => {
                message_map.extend(mappings.clone());
            }

            Rule::ShiftDate { selector, policy } => {
                date_map.extend(date_mappings(repo, selector, policy)?);
            }
        }
    }

    if !text_expressions.is_empty() {
        let file = write_temp(&text_expressions)?;
        args.push("--replace-text".to_string());
        args.push(file.path().to_string_lossy().into_owned());
        temp_files.push(file);
    }

    if !message_expressions.is_empty() {
        let file = write_temp(&message_expressions)?;
        args.push("--replace-message".to_string());
        args.push(file.path().to_string_lossy().into_owned());
        temp_files.push(file);
    }

    if !mailmap.is_empty() {
        let file = write_temp(&mailmap)?;
        args.push("--mailmap".to_string());
        args.push(file.path().to_string_lossy().into_owned());
        temp_files.push(file);
    }

    if !message_map.is_empty() || !date_map.is_empty() {
        let script = callback_script(&message_map, &date_map)?;
        let file = write_temp(&script)?;
        args.push("--commit-callback".to_string());
        args.push(format!("filename:{}", file.path().to_string_lossy()));
        temp_files.push(file);
    }

    if args.is_empty() {
        return Ok(None);
    }

    // Restrict the rewrite to the current branch; other refs, including the
    // backup branches, keep the original commits.
    let refs_target = repo.current_branch()?.unwrap_or_else(|| "HEAD".to_string());
    args.push("--refs".to_string());
    args.push(refs_target);
    args.push("--force".to_string());

    Ok(Some(EngineInvocation {
        args,
        _temp_files: temp_files,
    }))
}

/// Run a prepared engine invocation against a repository
pub fn run(repo: &Repository, invocation: &EngineInvocation) -> GitResult<()> {
    let mut argv: Vec<&str> = vec!["filter-repo"];
    argv.extend(invocation.args.iter().map(String::as_str));
    repo.executor()
        .run_with_timeout(&argv, repo.executor().long_timeout())?;
    Ok(())
}

/// Apply an ordered rule sequence: squash phase first, then the engine
pub fn apply(repo: &Repository, rules: &[Rule]) -> GitResult<()> {
    for rule in rules {
        if let Rule::SquashRange {
            from, new_message, ..
        } = rule
        {
            repo.executor().run(&["reset", "--soft", from])?;
            repo.executor()
                .run(&["commit", "--allow-empty", "-m", new_message])?;
        }
    }

    if let Some(invocation) = translate(repo, rules)? {
        run(repo, &invocation)?;
    }

    Ok(())
}

fn write_temp(content: &str) -> GitResult<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Generate the commit-callback script with embedded base64 data
///
/// Embedding JSON as base64 keeps user-controlled text out of the script
/// body, so no message content can escape into python syntax.
fn callback_script(
    message_map: &BTreeMap<String, String>,
    date_map: &BTreeMap<String, i64>,
) -> GitResult<String> {
    let messages = BASE64.encode(
        serde_json::to_string(message_map)
            .map_err(|e| GitError::ParseError(format!("Failed to encode message map: {}", e)))?,
    );
    let dates = BASE64.encode(
        serde_json::to_string(date_map)
            .map_err(|e| GitError::ParseError(format!("Failed to encode date map: {}", e)))?,
    );

    Ok(format!(
        r#"import base64, json
_MESSAGES = "{messages}"
_DATES = "{dates}"
MESSAGE_MAP = json.loads(base64.b64decode(_MESSAGES).decode())
DATE_MAP = json.loads(base64.b64decode(_DATES).decode())

def commit_callback(commit):
    commit_hash = commit.original_id.decode() if commit.original_id else None
    if not commit_hash:
        return
    if commit_hash in MESSAGE_MAP:
        commit.message = MESSAGE_MAP[commit_hash].encode()
    if commit_hash in DATE_MAP:
        stamp = "%d +0000" % DATE_MAP[commit_hash]
        commit.author_date = stamp.encode()
        commit.committer_date = stamp.encode()
"#
    ))
}

/// Compute original-id -> unix timestamp for a date rule
///
/// Reads the repository's current commits, so the mapping reflects any
/// squash that already ran.
pub(crate) fn date_mappings(
    repo: &Repository,
    selector: &CommitSelector,
    policy: &DatePolicy,
) -> GitResult<BTreeMap<String, i64>> {
    let mut commits = repo.commits_from("HEAD", None)?;
    commits.reverse(); // oldest first

    let selected: Vec<&CommitEntry> = match selector {
        CommitSelector::All => commits.iter().collect(),
        CommitSelector::Hashes(hashes) => {
            let wanted: BTreeSet<&str> = hashes.iter().map(String::as_str).collect();
            commits
                .iter()
                .filter(|c| wanted.contains(c.hash.as_str()))
                .collect()
        }
    };

    match policy {
        DatePolicy::Offset { seconds } => {
            let mut map = BTreeMap::new();
            for entry in selected {
                map.insert(entry.hash.clone(), commit_timestamp(entry)? + seconds);
            }
            Ok(map)
        }
        DatePolicy::Window {
            start_hour,
            end_hour,
            weekend_only,
            preserve_order,
        } => window_timestamps(
            &selected,
            *start_hour,
            *end_hour,
            *weekend_only,
            *preserve_order,
        ),
    }
}

fn commit_timestamp(entry: &CommitEntry) -> GitResult<i64> {
    DateTime::parse_from_rfc3339(&entry.date)
        .map(|d| d.timestamp())
        .map_err(|e| GitError::ParseError(format!("Bad commit date '{}': {}", entry.date, e)))
}

/// Re-time commits into a daily window, walking forward from the oldest
/// commit's original date
fn window_timestamps(
    commits: &[&CommitEntry],
    start_hour: u32,
    end_hour: u32,
    weekend_only: bool,
    preserve_order: bool,
) -> GitResult<BTreeMap<String, i64>> {
    let mut rng = rand::thread_rng();
    let mut map = BTreeMap::new();

    let mut current: DateTime<Utc> = match commits.first() {
        Some(entry) => DateTime::parse_from_rfc3339(&entry.date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| GitError::ParseError(format!("Bad commit date '{}': {}", entry.date, e)))?,
        None => return Ok(map),
    };
    let mut prev: Option<DateTime<Utc>> = None;

    for entry in commits {
        let mut new_dt = current;
        for _ in 0..16 {
            let hour = if end_hour >= start_hour {
                rng.gen_range(start_hour..=end_hour)
            } else if rng.gen_bool(0.5) {
                // Window crosses midnight, e.g. 22:00-02:00
                rng.gen_range(start_hour..=23)
            } else {
                rng.gen_range(0..=end_hour)
            };

            let candidate = current
                .with_hour(hour)
                .and_then(|d| d.with_minute(rng.gen_range(0..60)))
                .and_then(|d| d.with_second(rng.gen_range(0..60)))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(current);

            if weekend_only && candidate.weekday().number_from_monday() < 6 {
                let days_to_saturday = 6 - candidate.weekday().number_from_monday();
                current += Duration::days(days_to_saturday as i64);
                continue;
            }

            new_dt = candidate;
            break;
        }

        if preserve_order {
            if let Some(p) = prev {
                if new_dt <= p {
                    new_dt = p + Duration::minutes(rng.gen_range(5..60));
                    current = new_dt;
                }
            }
        }

        map.insert(entry.hash.clone(), new_dt.timestamp());
        prev = Some(new_dt);

        if rng.gen_bool(0.3) {
            current += Duration::days(1);
        }
    }

    Ok(map)
}
