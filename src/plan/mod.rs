pub mod compiler;
pub mod rule;

pub use compiler::{CompileError, CompileOptions, Plan, PlanCompiler};
pub use rule::{CommitSelector, DatePolicy, PathMode, Rule, TextScope};
