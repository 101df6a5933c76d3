use crate::calendar::WorkCalendar;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "PROGRAMME_ENGINE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine-wide settings. Everything has a default so an empty JSON object is
/// a valid config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Work pattern for owners without a factory or with an unknown one.
    pub default_working_days: Vec<Weekday>,
    /// Factory id to weekly work pattern.
    pub factories: HashMap<String, Vec<Weekday>>,
    /// Years of holidays expanded from an owner's base start date.
    pub holiday_window_years: u32,
    pub holiday_cache_capacity: u64,
    /// Fail recalculation on unresolvable predecessors instead of falling
    /// back to chaining.
    pub strict_predecessors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_working_days: WorkCalendar::STANDARD_WEEK.to_vec(),
            factories: HashMap::new(),
            holiday_window_years: 5,
            holiday_cache_capacity: 64,
            strict_predecessors: false,
        }
    }
}

impl EngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let display = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_reader(file).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file named by `PROGRAMME_ENGINE_CONFIG`, or defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!(path = %path, "loading engine config");
                Self::from_path(path.trim())
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.holiday_window_years == 0 {
            return Err(ConfigError::Invalid(
                "holiday_window_years must be at least 1".into(),
            ));
        }
        if self.holiday_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "holiday_cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_factory<I>(mut self, factory_id: impl Into<String>, working_days: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        self.factories
            .insert(factory_id.into(), working_days.into_iter().collect());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_predecessors = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_object_gives_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.holiday_window_years, 5);
    }

    #[test]
    fn reads_factories_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"factories": {{"north": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]}}, "strict_predecessors": true}}"#
        )
        .unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.factories["north"].len(), 6);
        assert!(config.strict_predecessors);
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"holiday_window_years": 0}}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_path(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
