use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    // Initialize git repo
    Command::new("git")
        .args(&["init"])
        .current_dir(&repo_path)
        .output()
        .expect("Failed to init git repo");

    // Configure git
    Command::new("git")
        .args(&["config", "user.name", "Test User"])
        .current_dir(&repo_path)
        .output()
        .expect("Failed to set git user.name");

    Command::new("git")
        .args(&["config", "user.email", "test@example.com"])
        .current_dir(&repo_path)
        .output()
        .expect("Failed to set git user.email");

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &PathBuf, file: &str, content: &str, message: &str) {
    let file_path = repo_path.join(file);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&file_path, content).expect("Failed to write file");

    Command::new("git")
        .args(&["add", file])
        .current_dir(repo_path)
        .output()
        .expect("Failed to add file");

    Command::new("git")
        .args(&["commit", "-m", message])
        .current_dir(repo_path)
        .output()
        .expect("Failed to commit");
}

/// Number of commits reachable from HEAD
pub fn commit_count(repo_path: &PathBuf) -> usize {
    let output = Command::new("git")
        .args(&["rev-list", "--count", "HEAD"])
        .current_dir(repo_path)
        .output()
        .expect("Failed to count commits");
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .expect("Failed to parse commit count")
}

/// Full hash of HEAD
pub fn head_hash(repo_path: &PathBuf) -> String {
    let output = Command::new("git")
        .args(&["rev-parse", "HEAD"])
        .current_dir(repo_path)
        .output()
        .expect("Failed to resolve HEAD");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Every path that ever existed in the current branch's history
pub fn paths_in_history(repo_path: &PathBuf) -> String {
    let output = Command::new("git")
        .args(&["log", "--format=", "--name-only", "HEAD"])
        .current_dir(repo_path)
        .output()
        .expect("Failed to list historical paths");
    String::from_utf8_lossy(&output.stdout).to_string()
}
