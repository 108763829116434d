//! TOML-based engine configuration.
//!
//! Stores:
//! - The fixed civil timezone used for day keys
//! - The storage namespace prefix
//! - Selection tuning (minimum viable pool, default band)
//! - Per-feature daily quotas
//! - Streak history retention
//!
//! Configuration is stored at `~/.config/dailypick/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::quota::{QuotaLimits, QuotaPolicy, QuotaScope};

/// Civil timezone used to turn instants into day keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    /// Offset from UTC in minutes, e.g. 540 for UTC+09:00.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Prefix applied to every persisted key.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Selection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Below this many candidates the fallback cascade widens the search.
    #[serde(default = "default_min_viable_pool")]
    pub min_viable_pool: usize,
    /// Band assumed for legacy records that carry none.
    #[serde(default = "default_band")]
    pub default_band: String,
}

/// Daily quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Ceiling for features without an explicit policy.
    #[serde(default = "default_quota_limit")]
    pub default_limit: u32,
    #[serde(default = "default_feature_quotas")]
    pub features: BTreeMap<String, QuotaPolicy>,
}

/// Streak configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Number of days of point history kept.
    #[serde(default = "default_history_days")]
    pub history_days: usize,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/dailypick/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timezone: TimezoneConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub quotas: QuotaConfig,
    #[serde(default)]
    pub streak: StreakConfig,
}

// Default functions
fn default_namespace() -> String {
    "dailypick".into()
}
fn default_min_viable_pool() -> usize {
    2
}
fn default_band() -> String {
    "3-5".into()
}
fn default_quota_limit() -> u32 {
    3
}
fn default_history_days() -> usize {
    30
}
fn default_feature_quotas() -> BTreeMap<String, QuotaPolicy> {
    let mut features = BTreeMap::new();
    features.insert(
        "plan".to_string(),
        QuotaPolicy {
            limit: 3,
            scope: QuotaScope::Generation,
        },
    );
    features.insert(
        "story".to_string(),
        QuotaPolicy {
            limit: 5,
            scope: QuotaScope::GenerationAndAccess,
        },
    );
    features
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_viable_pool: default_min_viable_pool(),
            default_band: default_band(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_limit: default_quota_limit(),
            features: default_feature_quotas(),
        }
    }
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: TimezoneConfig::default(),
            storage: StorageConfig::default(),
            selection: SelectionConfig::default(),
            quotas: QuotaConfig::default(),
            streak: StreakConfig::default(),
        }
    }
}

impl QuotaConfig {
    /// Resolved limits for the quota counter.
    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits::new(self.default_limit).with_policies(self.features.clone())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location or return (and write) defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown
    /// or the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // chrono::FixedOffset accepts strictly less than a day.
        if self.timezone.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue {
                key: "timezone.utc_offset_minutes".into(),
                message: "offset must be within ±1439 minutes".into(),
            });
        }
        if self.storage.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.namespace".into(),
                message: "namespace must not be empty".into(),
            });
        }
        if self.selection.min_viable_pool == 0 {
            return Err(ConfigError::InvalidValue {
                key: "selection.min_viable_pool".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
