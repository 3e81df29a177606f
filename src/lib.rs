pub mod ai;
pub mod analyzer;
pub mod audit;
pub mod backup;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod plan;
pub mod secrets;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{GitVersion, Repository, validate_toolchain};
pub use plan::{CompileOptions, Plan, PlanCompiler, Rule};
