//! Engine configuration.
//!
//! # Responsibility
//! - Describe storage, logging and work-queue settings with defaults.
//! - Load TOML files and apply `NEWSROOM_*` environment overrides.
//!
//! # Invariants
//! - Every field has a default; an empty file is a valid configuration.
//! - `validate()` runs before a loaded config is returned.
//!
//! Precedence (highest first): environment, file, defaults.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub work_queue: WorkQueueSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path. `None` opens an in-memory database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How long a writer waits for the database lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkQueueSettings {
    /// Newsroom UTC offset used to find day boundaries.
    pub utc_offset_minutes: i32,
    /// Width of the `due_soon` window counted from the start of today.
    pub due_soon_days: u32,
}

impl Default for WorkQueueSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            due_soon_days: 7,
        }
    }
}

/// Configuration load/validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_toml_str(&content)?;
                info!(
                    "event=config_load module=config status=ok source=file path={}",
                    path.display()
                );
                config
            }
            None => {
                debug!("event=config_load module=config status=ok source=defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without applying overrides.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Applies `NEWSROOM_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values keep the previous value and are logged at
    /// `warn`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("NEWSROOM_DB_PATH") {
            self.database.path = Some(PathBuf::from(value));
        }
        if let Some(parsed) = parse_numeric_override::<u64>(&lookup, "NEWSROOM_DB_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = parsed;
        }
        if let Some(value) = lookup("NEWSROOM_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("NEWSROOM_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(value));
        }
        if let Some(parsed) = parse_numeric_override::<i32>(&lookup, "NEWSROOM_UTC_OFFSET_MINUTES") {
            self.work_queue.utc_offset_minutes = parsed;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.trim().to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) && level != "warning" {
            return Err(ConfigError::Invalid(format!(
                "log level `{}` must be one of {}",
                self.logging.level,
                VALID_LOG_LEVELS.join("|")
            )));
        }

        if let Some(dir) = self.logging.dir.as_ref() {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }

        if self.work_queue.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "work_queue.utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }

        if self.work_queue.due_soon_days == 0 {
            return Err(ConfigError::Invalid(
                "work_queue.due_soon_days must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_numeric_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(
                "event=config_override module=config status=error error_code=unparseable_number key={} value={:?}",
                key, value
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.work_queue.due_soon_days, 7);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn parses_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/newsroom/engine.sqlite3"

            [work_queue]
            utc_offset_minutes = 120
            "#,
        )
        .expect("config should parse");
        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/newsroom/engine.sqlite3"))
        );
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.work_queue.utc_offset_minutes, 120);
        assert_eq!(config.work_queue.due_soon_days, 7);
    }

    #[test]
    fn overrides_replace_file_values_and_skip_garbage_numbers() {
        let mut config = EngineConfig::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("NEWSROOM_LOG_LEVEL", "warn"),
            ("NEWSROOM_UTC_OFFSET_MINUTES", "not-a-number"),
            ("NEWSROOM_DB_BUSY_TIMEOUT_MS", "250"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.work_queue.utc_offset_minutes, 0);
        assert_eq!(config.database.busy_timeout_ms, 250);
    }

    #[test]
    fn unparseable_numbers_keep_file_values() {
        let mut config = EngineConfig::default();
        config.work_queue.utc_offset_minutes = 120;
        config.database.busy_timeout_ms = 900;
        let env: HashMap<&str, &str> = HashMap::from([
            ("NEWSROOM_UTC_OFFSET_MINUTES", "+2h"),
            ("NEWSROOM_DB_BUSY_TIMEOUT_MS", "-1"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.work_queue.utc_offset_minutes, 120);
        assert_eq!(config.database.busy_timeout_ms, 900);
    }

    #[test]
    fn validate_rejects_relative_log_dir_and_bad_level() {
        let mut config = EngineConfig::default();
        config.logging.dir = Some(PathBuf::from("logs"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_due_soon_window() {
        let mut config = EngineConfig::default();
        config.work_queue.due_soon_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("newsroom.toml");
        std::fs::write(&path, "[work_queue]\ndue_soon_days = 3\n").expect("write config");

        let config = EngineConfig::load(Some(&path)).expect("config should load");
        assert_eq!(config.work_queue.due_soon_days, 3);
    }
}
