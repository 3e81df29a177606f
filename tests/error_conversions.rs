use resculpt::ai::AiError;
use resculpt::backup::RestoreError;
use resculpt::config::ConfigError;
use resculpt::engine::ExecutionError;
use resculpt::error::{AppError, GitError};
use resculpt::plan::CompileError;

#[test]
fn test_git_error_converts_to_app_error() {
    let err: AppError = GitError::NotARepository.into();
    assert!(matches!(err, AppError::Git(_)));
}

#[test]
fn test_compile_error_converts_to_app_error() {
    let err: AppError = CompileError::EmptyPlan.into();
    assert!(matches!(err, AppError::Compile(_)));
}

#[test]
fn test_execution_error_converts_to_app_error() {
    let err: AppError = ExecutionError::StalePlan {
        expected: "abc".to_string(),
        actual: "def".to_string(),
    }
    .into();
    assert!(matches!(err, AppError::Execution(_)));
}

#[test]
fn test_restore_error_converts_to_app_error() {
    let err: AppError = RestoreError::RefMoved("backup/x".to_string()).into();
    assert!(matches!(err, AppError::Restore(_)));
}

#[test]
fn test_config_error_converts_to_app_error() {
    let err: AppError = ConfigError::InvalidValue("bad".to_string()).into();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn test_ai_error_converts_to_app_error() {
    let err: AppError = AiError::RateLimitExceeded(30).into();
    assert!(matches!(err, AppError::Ai(_)));
}

#[test]
fn test_io_error_converts_through_git_error() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: GitError = io.into();
    assert!(matches!(err, GitError::IoError(_)));
}

#[test]
fn test_error_messages_are_descriptive() {
    let err = ExecutionError::StalePlan {
        expected: "abc123".to_string(),
        actual: "def456".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("abc123"));
    assert!(msg.contains("def456"));
}
