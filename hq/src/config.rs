//! HabitQuest configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main HabitQuest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AI coach provider configuration
    pub ai: AiConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before using the AI coach
    ///
    /// Call this before any command that talks to the provider so a missing
    /// key fails fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if self.ai.api_key().is_none() {
            return Err(eyre::eyre!(
                "AI API key not found. Set the {} environment variable.",
                self.ai.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .habitquest.yml
        let local_config = PathBuf::from(".habitquest.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/habitquest/habitquest.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("habitquest").join("habitquest.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// AI coach provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Generative Language API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Candidate models, highest priority first
    pub models: Vec<String>,

    /// Name fragments used to pick a fallback model when no candidate is served
    #[serde(rename = "family-markers")]
    pub family_markers: Vec<String>,

    /// Generation attempts per model
    #[serde(rename = "attempts-per-model")]
    pub attempts_per_model: u32,

    /// Pause after a rate-limited attempt, in milliseconds
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            models: ["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"]
                .into_iter()
                .map(String::from)
                .collect(),
            family_markers: vec!["flash".to_string(), "pro".to_string()],
            attempts_per_model: 2,
            backoff_ms: 2000,
            timeout_ms: 60_000,
        }
    }
}

impl AiConfig {
    /// API key from the configured environment variable, trimmed; `None` if unset or blank
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Number of entries shown by `leaderboard` when no limit is given
    #[serde(rename = "leaderboard-size")]
    pub leaderboard_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/habitquest on Linux)
        let database_path = dirs::data_dir()
            .map(|d| d.join("habitquest"))
            .unwrap_or_else(|| PathBuf::from(".habitquest"))
            .join("habitquest.db");

        Self {
            database_path,
            leaderboard_size: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.ai.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.ai.models[0], "gemini-2.0-flash");
        assert_eq!(config.ai.attempts_per_model, 2);
        assert_eq!(config.ai.backoff_ms, 2000);
        assert!(config.storage.database_path.ends_with("habitquest.db"));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
ai:
  base-url: http://localhost:9000
  api-key-env: MY_GEMINI_KEY
  models: [gemini-x]
  family-markers: [lite]
  attempts-per-model: 3
  backoff-ms: 10

storage:
  database-path: /tmp/hq.db
  leaderboard-size: 5

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.ai.base_url, "http://localhost:9000");
        assert_eq!(config.ai.api_key_env, "MY_GEMINI_KEY");
        assert_eq!(config.ai.models, vec!["gemini-x"]);
        assert_eq!(config.ai.family_markers, vec!["lite"]);
        assert_eq!(config.ai.attempts_per_model, 3);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/hq.db"));
        assert_eq!(config.storage.leaderboard_size, 5);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
ai:
  backoff-ms: 0
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.ai.backoff_ms, 0);
        assert_eq!(config.ai.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.ai.timeout_ms, 60_000);
        assert_eq!(config.storage.leaderboard_size, 20);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hq.yml");
        fs::write(&path, "log-level: warn\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/definitely/not/here/hq.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let mut config = Config::default();
        config.ai.api_key_env = "HQ_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(config.validate().is_err());
    }
}
