//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `stargazer-config.yaml` at the
//! project root. Every section is optional; missing values fall back to
//! the defaults below, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stargazer_types::LevelId;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration. Mirrors `stargazer-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Dispatcher settings.
    #[serde(default)]
    pub engine: DispatchConfig,

    /// Level registry and transition settings.
    #[serde(default)]
    pub levels: LevelsConfig,

    /// Save storage and autosave pacing.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides from the process environment.
    ///
    /// - `STARGAZER_SAVE_DIR` overrides `persistence.storage_dir`
    /// - `STARGAZER_LOG_LEVEL` overrides `logging.level`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse and check configuration from a YAML string. No environment
    /// overrides are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.check()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("STARGAZER_SAVE_DIR") {
            self.persistence.storage_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("STARGAZER_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.engine.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine.history_capacity must be at least 1".to_owned(),
            });
        }
        if self.levels.registry.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "levels.registry must contain at least one level".to_owned(),
            });
        }
        if !self
            .levels
            .registry
            .iter()
            .any(|level| level.id == self.levels.default_level)
        {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "levels.default_level `{}` is not in levels.registry",
                    self.levels.default_level
                ),
            });
        }
        Ok(())
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Number of action history entries retained.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Repair invalid snapshots automatically.
    #[serde(default = "default_true")]
    pub auto_fix: bool,

    /// Dispatches slower than this (microseconds) are logged as warnings.
    #[serde(default = "default_slow_dispatch_warn_us")]
    pub slow_dispatch_warn_us: u64,

    /// `STATS_INCREMENT` amounts above this are tagged as suspicious.
    #[serde(default = "default_max_increment")]
    pub max_increment: i64,

    /// `TIME_UPDATE` deltas above this are tagged as suspicious.
    #[serde(default = "default_max_time_delta_ms")]
    pub max_time_delta_ms: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            auto_fix: true,
            slow_dispatch_warn_us: default_slow_dispatch_warn_us(),
            max_increment: default_max_increment(),
            max_time_delta_ms: default_max_time_delta_ms(),
        }
    }
}

/// One registered level.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelDefinition {
    /// Level identifier.
    pub id: LevelId,
    /// Display name.
    pub name: String,
    /// Whether stars can be selected while this level is active.
    #[serde(default)]
    pub supports_selection: bool,
}

/// Level registry and transition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelsConfig {
    /// Level a fresh session starts on.
    #[serde(default = "default_level")]
    pub default_level: LevelId,

    /// Maximum time a level load may take before it counts as failed.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Registered levels.
    #[serde(default = "default_registry")]
    pub registry: Vec<LevelDefinition>,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            load_timeout_ms: default_load_timeout_ms(),
            registry: default_registry(),
        }
    }
}

/// Save storage and autosave configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding save records.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Fixed key the save record is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Number of progress actions between autosaves (0 disables autosave).
    #[serde(default = "default_autosave_every")]
    pub autosave_every: u32,

    /// Minimum time between two autosaves.
    #[serde(default = "default_autosave_min_interval_ms")]
    pub autosave_min_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            storage_key: default_storage_key(),
            autosave_every: default_autosave_every(),
            autosave_min_interval_ms: default_autosave_min_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_history_capacity() -> usize {
    100
}

const fn default_slow_dispatch_warn_us() -> u64 {
    4_000
}

const fn default_max_increment() -> i64 {
    1_000
}

const fn default_max_time_delta_ms() -> i64 {
    60_000
}

fn default_level() -> LevelId {
    LevelId::new("observatory")
}

const fn default_load_timeout_ms() -> u64 {
    15_000
}

fn default_registry() -> Vec<LevelDefinition> {
    vec![
        LevelDefinition {
            id: LevelId::new("observatory"),
            name: "Observatory Island".to_owned(),
            supports_selection: true,
        },
        LevelDefinition {
            id: LevelId::new("planetarium"),
            name: "Planetarium".to_owned(),
            supports_selection: true,
        },
        LevelDefinition {
            id: LevelId::new("miranda"),
            name: "Miranda".to_owned(),
            supports_selection: false,
        },
        LevelDefinition {
            id: LevelId::new("forest"),
            name: "Forest Trail".to_owned(),
            supports_selection: false,
        },
    ]
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".stargazer")
}

fn default_storage_key() -> String {
    "stargazer.save".to_owned()
}

const fn default_autosave_every() -> u32 {
    25
}

const fn default_autosave_min_interval_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.history_capacity, 100);
        assert_eq!(config.levels.default_level, LevelId::new("observatory"));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = EngineConfig::parse(include_str!("../../../stargazer-config.yaml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r"
engine:
  history_capacity: 10
persistence:
  autosave_every: 3
";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.engine.history_capacity, 10);
        assert!(config.engine.auto_fix);
        assert_eq!(config.persistence.autosave_every, 3);
        assert_eq!(config.persistence.storage_key, "stargazer.save");
    }

    #[test]
    fn custom_registry_parses() {
        let yaml = r"
levels:
  default_level: dome
  registry:
    - id: dome
      name: The Dome
      supports_selection: true
    - id: crater
      name: Crater
";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.levels.registry.len(), 2);
        assert!(!config.levels.registry.iter().any(|l| l.id.as_str() == "crater" && l.supports_selection));
    }

    #[test]
    fn default_level_must_be_registered() {
        let yaml = r"
levels:
  default_level: nowhere
";
        assert!(matches!(
            EngineConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_history_capacity_is_rejected() {
        let yaml = "engine:\n  history_capacity: 0\n";
        assert!(matches!(
            EngineConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            EngineConfig::parse("engine: [unterminated"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = EngineConfig::default();
        config.apply_env_overrides(|key| match key {
            "STARGAZER_SAVE_DIR" => Some("/tmp/saves".to_owned()),
            "STARGAZER_LOG_LEVEL" => Some("debug".to_owned()),
            _ => None,
        });
        assert_eq!(config.persistence.storage_dir, PathBuf::from("/tmp/saves"));
        assert_eq!(config.logging.level, "debug");
    }
}
