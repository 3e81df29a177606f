pub mod settings;

pub use settings::{AiConfig, BehaviorConfig, Config, ConfigError, GitConfig};
