use resculpt::ai::{self, MessageRewriter, MessageStyle};
use resculpt::analyzer;
use resculpt::audit::AuditLogger;
use resculpt::backup::BackupManager;
use resculpt::config::Config;
use resculpt::git::{Repository, validate_toolchain};
use resculpt::secrets::scanner::{ScanScope, SecretScanner};
use std::time::Duration;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Validate git version and engine presence up front
    match validate_toolchain() {
        Ok(version) => {
            eprintln!("Git version: {}", version);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    // Discover repository
    let mut repo = match Repository::discover() {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let config = Config::load_or_default();
    repo.set_timeouts(
        Duration::from_secs(config.git.timeout_seconds),
        Duration::from_secs(config.git.filter_repo_timeout_seconds),
    );

    let result = match args.first().map(String::as_str) {
        Some("analyze") => cmd_analyze(&repo),
        Some("files") => cmd_files(&repo),
        Some("history") => match args.get(1) {
            Some(path) => cmd_history(&repo, path),
            None => usage("history <path>"),
        },
        Some("scan") => cmd_scan(&repo, args.iter().any(|a| a == "--history")),
        Some("reword") => cmd_reword(
            &repo,
            &config,
            args.get(1).and_then(|s| s.parse().ok()),
        ),
        Some("backup") => cmd_backup(repo, &config, args.get(1).map(String::as_str)),
        Some("backups") => cmd_backups(repo),
        Some("restore") => match args.get(1) {
            Some(ref_name) => cmd_restore(
                repo,
                &config,
                ref_name,
                args.iter().any(|a| a == "--force"),
            ),
            None => usage("restore <ref> [--force]"),
        },
        _ => usage("analyze | files | history <path> | scan [--history] | reword [count] | backup [label] | backups | restore <ref> [--force]"),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn usage(msg: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Usage: resculpt {}", msg);
    std::process::exit(2);
}

fn cmd_analyze(repo: &Repository) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = analyzer::analyze(repo)?;

    println!("Head:    {}", snapshot.head);
    println!("Commits: {}", snapshot.commit_count);
    println!("Authors:");
    for (author, count) in &snapshot.authors {
        println!("  {:5}  {}", count, author);
    }
    Ok(())
}

fn cmd_files(repo: &Repository) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = analyzer::analyze(repo)?;

    let mut files: Vec<_> = snapshot.file_touches.iter().collect();
    files.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (path, touches) in files {
        println!("{:5}  {}", touches, path);
    }
    Ok(())
}

fn cmd_history(repo: &Repository, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let commits = analyzer::file_history(repo, path)?;

    if commits.is_empty() {
        println!("No commits touch {}", path);
        return Ok(());
    }
    for commit in commits {
        println!("{}  {}", commit.short_hash(), commit.message);
    }
    Ok(())
}

fn cmd_scan(repo: &Repository, history: bool) -> Result<(), Box<dyn std::error::Error>> {
    let scope = if history {
        ScanScope::AllHistory
    } else {
        ScanScope::WorkingTree
    };
    let scanner = SecretScanner::new();
    let summary = scanner.scan(repo, scope)?;

    println!(
        "Scanned {} files across {} commits",
        summary.files_scanned, summary.commits_scanned
    );
    if summary.cancelled {
        println!("(scan truncated)");
    }

    for finding in &summary.findings {
        let location = match &finding.commit {
            Some(commit) => format!("{}:{}:{}", &commit[..7.min(commit.len())], finding.file, finding.line),
            None => format!("{}:{}", finding.file, finding.line),
        };
        println!(
            "[{:?}] {} at {}: {}",
            finding.confidence, finding.description, location, finding.preview
        );
    }
    for file in &summary.sensitive_files {
        println!("[{:?}] sensitive file: {}", file.risk, file.path);
    }
    if summary.findings.is_empty() && summary.sensitive_files.is_empty() {
        println!("No secrets found");
    }
    Ok(())
}

/// Propose replacement messages for recent commits, without rewriting
fn cmd_reword(
    repo: &Repository,
    config: &Config,
    count: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(provider) = ai::provider_from_config(config) else {
        eprintln!(
            "No AI provider configured; set ai.provider in {}",
            Config::config_path()?.display()
        );
        std::process::exit(1);
    };

    let rewriter = MessageRewriter::new(provider, MessageStyle::Conventional);
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(rewriter.rewrite(repo, count))?;

    if outcome.mappings.is_empty() {
        println!("No messages to change");
    }
    for (commit, message) in &outcome.mappings {
        println!("{}  {}", &commit[..8.min(commit.len())], message);
    }
    if outcome.unchanged > 0 {
        println!("{} messages kept as-is", outcome.unchanged);
    }
    for (commit, error) in &outcome.failures {
        eprintln!("{}  failed: {}", &commit[..8.min(commit.len())], error);
    }
    Ok(())
}

fn cmd_backup(
    repo: Repository,
    config: &Config,
    label: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo_path = repo.path().to_path_buf();
    let manager = BackupManager::new(repo);
    let record = manager.create(label.unwrap_or("manual"))?;
    if config.behavior.log_operations {
        if let Ok(logger) = AuditLogger::new() {
            let _ = logger.log_backup(&record.ref_name, &record.commit, &repo_path);
        }
    }
    println!("Created {} at {}", record.ref_name, record.commit);
    Ok(())
}

fn cmd_backups(repo: Repository) -> Result<(), Box<dyn std::error::Error>> {
    let manager = BackupManager::new(repo);
    let records = manager.list()?;

    if records.is_empty() {
        println!("No backups");
        return Ok(());
    }
    for record in records {
        println!("{}  {}", record.ref_name, record.commit);
    }
    Ok(())
}

fn cmd_restore(
    repo: Repository,
    config: &Config,
    ref_name: &str,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo_path = repo.path().to_path_buf();
    let manager = BackupManager::new(repo);
    let record = manager
        .find(ref_name)?
        .ok_or_else(|| format!("No backup named {}", ref_name))?;

    manager.restore(&record, force)?;
    if config.behavior.log_operations {
        if let Ok(logger) = AuditLogger::new() {
            let _ = logger.log_restore(&record.ref_name, &repo_path, force);
        }
    }
    println!("Restored {} to {}", record.ref_name, record.commit);
    Ok(())
}
