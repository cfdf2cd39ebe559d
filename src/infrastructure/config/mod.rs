//! Hierarchical configuration: programmatic defaults → project file →
//! environment variables.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::event_bus::Overflow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("max_retries cannot be 0")]
    InvalidMaxRetries,

    #[error("invalid event bus overflow policy: {0}. Must be one of: block, drop_oldest, coalesce")]
    InvalidOverflow(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: pretty, json")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongPollConfig {
    pub time_to_wait_for_task_ms: u64,
    pub polling_interval_ms: u64,
    pub max_retries: u32,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            time_to_wait_for_task_ms: 300_000,
            polling_interval_ms: 1_000,
            max_retries: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusSubscriberConfig {
    pub capacity: usize,
    pub overflow: String,
}

impl Default for EventBusSubscriberConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            overflow: "block".to_string(),
        }
    }
}

impl EventBusSubscriberConfig {
    pub fn overflow_policy(&self) -> Result<Overflow, ConfigError> {
        match self.overflow.as_str() {
            "block" => Ok(Overflow::Block),
            "drop_oldest" => Ok(Overflow::DropOldest),
            "coalesce" => Ok(Overflow::Coalesce),
            other => Err(ConfigError::InvalidOverflow(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfigSection {
    pub tasks: EventBusSubscriberConfig,
    pub agents: EventBusSubscriberConfig,
}

impl Default for EventBusConfigSection {
    fn default() -> Self {
        Self {
            tasks: EventBusSubscriberConfig::default(),
            agents: EventBusSubscriberConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfigSection {
    pub path: String,
}

impl Default for DatabaseConfigSection {
    fn default() -> Self {
        Self {
            path: "coordination.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubprocessConfigSection {
    pub kill_grace_period_ms: u64,
}

impl Default for SubprocessConfigSection {
    fn default() -> Self {
        Self {
            kill_grace_period_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfigSection {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfigSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub long_poll: LongPollConfig,
    pub event_bus: EventBusConfigSection,
    pub database: DatabaseConfigSection,
    pub subprocess: SubprocessConfigSection,
    pub logging: LoggingConfigSection,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest): programmatic defaults, `coordination.yaml`
    /// in the working directory, then `COORD__`-prefixed environment variables.
    pub fn load() -> anyhow::Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file("coordination.yaml"))
            .merge(Env::prefixed("COORD__").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.long_poll.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }
        config.event_bus.tasks.overflow_policy()?;
        config.event_bus.agents.overflow_policy()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "coordination.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn zero_max_retries_is_rejected() {
        let mut config = AppConfig::default();
        config.long_poll.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries)
        ));
    }

    #[test]
    fn unknown_overflow_policy_is_rejected() {
        let mut config = AppConfig::default();
        config.event_bus.tasks.overflow = "retry_forever".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidOverflow(_))
        ));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn overflow_policy_strings_map_to_the_expected_variant() {
        let mut cfg = EventBusSubscriberConfig::default();
        cfg.overflow = "drop_oldest".to_string();
        assert_eq!(cfg.overflow_policy().unwrap(), Overflow::DropOldest);
        cfg.overflow = "coalesce".to_string();
        assert_eq!(cfg.overflow_policy().unwrap(), Overflow::Coalesce);
        cfg.overflow = "block".to_string();
        assert_eq!(cfg.overflow_policy().unwrap(), Overflow::Block);
    }
}
