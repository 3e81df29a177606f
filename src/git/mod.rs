pub mod executor;
pub mod parser;
pub mod repository;
pub mod version;

// Re-export commonly used types
pub use executor::{CommandOutput, GitExecutor, TIMEOUT_DEFAULT, TIMEOUT_FAST, TIMEOUT_LONG};
pub use parser::{
    CommitEntry, RefEntry, parse_commit_log, parse_count, parse_count_objects,
    parse_name_only_log, parse_ref_list,
};
pub use repository::{COMMIT_LOG_FORMAT, Repository};
pub use version::{GitVersion, validate_toolchain};
