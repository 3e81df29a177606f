use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub ai: AiConfig,
    pub behavior: BehaviorConfig,
    pub git: GitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AiConfig {
    /// "anthropic", "ollama" or "none"
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub ollama_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BehaviorConfig {
    /// New plans default to dry-run; execution is an explicit opt-in
    pub default_dry_run: bool,
    pub auto_backup: bool,
    pub log_operations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitConfig {
    pub timeout_seconds: u64,
    pub filter_repo_timeout_seconds: u64,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("resculpt"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(_) => Self::default_config(),
        }
    }

    /// Load configuration from file
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Config file not found",
            )));
        }

        let contents = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self)?;

        fs::write(&path, contents)?;

        // Set permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            ai: AiConfig {
                provider: "none".to_string(),
                model: "claude-sonnet-4-5-20250929".to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                ollama_base_url: "http://localhost:11434".to_string(),
                api_key: None,
            },
            behavior: BehaviorConfig {
                default_dry_run: true,
                auto_backup: true,
                log_operations: true,
            },
            git: GitConfig {
                timeout_seconds: 30,
                filter_repo_timeout_seconds: 300,
            },
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        match self.ai.provider.as_str() {
            "anthropic" | "ollama" | "none" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Unsupported AI provider: {}. Use 'anthropic', 'ollama' or 'none'",
                    other
                )));
            }
        }

        if self.ai.provider == "anthropic" && !self.ai.model.starts_with("claude-") {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid model name: {}. Must be a Claude model",
                self.ai.model
            )));
        }

        if self.git.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.git.filter_repo_timeout_seconds < self.git.timeout_seconds {
            return Err(ConfigError::InvalidValue(
                "filter_repo_timeout_seconds must not be below timeout_seconds".to_string(),
            ));
        }

        Ok(())
    }

    /// Get API key from environment variable or config
    pub fn get_api_key(&self) -> Option<String> {
        // First try environment variable
        if let Ok(key) = std::env::var(&self.ai.api_key_env) {
            if !key.is_empty() {
                return Some(key);
            }
        }

        // Fall back to config file if present
        self.ai.api_key.clone()
    }

    /// Check if API key is available
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.ai.provider, "none");
        assert!(config.behavior.default_dry_run);
        assert!(config.behavior.auto_backup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_provider() {
        let mut config = Config::default_config();
        config.ai.provider = "openai".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_anthropic_requires_claude_model() {
        let mut config = Config::default_config();
        config.ai.provider = "anthropic".to_string();
        config.ai.model = "gpt-4".to_string();
        assert!(config.validate().is_err());

        config.ai.model = "claude-sonnet-4-5-20250929".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default_config();
        config.git.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_engine_timeout_floor() {
        let mut config = Config::default_config();
        config.git.filter_repo_timeout_seconds = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        unsafe {
            std::env::set_var("RESCULPT_TEST_API_KEY", "test-key-123");
        }
        let mut config = Config::default_config();
        config.ai.api_key_env = "RESCULPT_TEST_API_KEY".to_string();

        assert_eq!(config.get_api_key(), Some("test-key-123".to_string()));
        assert!(config.has_api_key());

        unsafe {
            std::env::remove_var("RESCULPT_TEST_API_KEY");
        }
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = Config::default_config();
        config.ai.api_key_env = "NONEXISTENT_VAR".to_string();
        config.ai.api_key = Some("config-key-456".to_string());

        assert_eq!(config.get_api_key(), Some("config-key-456".to_string()));
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = Config::default_config();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(config.ai.provider, parsed.ai.provider);
        assert_eq!(
            config.behavior.default_dry_run,
            parsed.behavior.default_dry_run
        );
    }
}
