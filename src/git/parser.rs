use crate::error::{GitError, GitResult};

/// A commit parsed from `git log --format=%H%x00%an%x00%ae%x00%s%x00%aI`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub date: String,
}

impl CommitEntry {
    /// Author in the canonical `Name <email>` form
    pub fn author(&self) -> String {
        format!("{} <{}>", self.author_name, self.author_email)
    }

    pub fn short_hash(&self) -> &str {
        if self.hash.len() >= 8 { &self.hash[..8] } else { &self.hash }
    }
}

/// A ref parsed from `git for-each-ref --format=%(refname:short)%00%(objectname)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub hash: String,
}

/// Parse commit log output with NUL-separated fields
pub fn parse_commit_log(output: &str) -> GitResult<Vec<CommitEntry>> {
    let mut commits = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\0').collect();
        if parts.len() < 5 {
            return Err(GitError::ParseError(format!(
                "Unexpected log line: {} fields",
                parts.len()
            )));
        }

        commits.push(CommitEntry {
            hash: parts[0].to_string(),
            author_name: parts[1].to_string(),
            author_email: parts[2].to_string(),
            // Subjects may themselves contain NULs only in pathological
            // repos; rejoin the tail rather than truncating it.
            message: parts[3..parts.len() - 1].join("\0"),
            date: parts[parts.len() - 1].to_string(),
        });
    }

    Ok(commits)
}

/// Parse `git log --name-only --format=%x01%H` output into (hash, files) pairs
pub fn parse_name_only_log(output: &str) -> GitResult<Vec<(String, Vec<String>)>> {
    let mut result: Vec<(String, Vec<String>)> = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        if let Some(hash) = line.strip_prefix('\u{1}') {
            result.push((hash.to_string(), Vec::new()));
        } else if let Some((_, files)) = result.last_mut() {
            files.push(line.to_string());
        }
        // Files before any commit header indicate malformed output; skip.
    }

    Ok(result)
}

/// Parse `git for-each-ref` output with NUL-separated fields
pub fn parse_ref_list(output: &str) -> GitResult<Vec<RefEntry>> {
    let mut refs = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\0').collect();
        if parts.len() >= 2 {
            refs.push(RefEntry {
                name: parts[0].to_string(),
                hash: parts[1].to_string(),
            });
        }
    }

    Ok(refs)
}

/// Parse `git count-objects -v` output into a total object-store byte count
///
/// `size` and `size-pack` are reported in KiB.
pub fn parse_count_objects(output: &str) -> GitResult<u64> {
    let mut total_kib: u64 = 0;
    let mut seen = false;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        match key.trim() {
            "size" | "size-pack" => {
                let kib = value.trim().parse::<u64>().map_err(|_| {
                    GitError::ParseError(format!("Invalid count-objects value: {}", value.trim()))
                })?;
                total_kib += kib;
                seen = true;
            }
            _ => {}
        }
    }

    if !seen {
        return Err(GitError::ParseError(
            "count-objects output missing size fields".to_string(),
        ));
    }

    Ok(total_kib * 1024)
}

/// Parse a non-negative integer from command output (e.g. `rev-list --count`)
pub fn parse_count(output: &str) -> GitResult<usize> {
    output
        .trim()
        .parse::<usize>()
        .map_err(|_| GitError::ParseError(format!("Invalid count: {}", output.trim())))
}
