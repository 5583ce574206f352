use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::StorageProvider;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: BTreeMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a configuration value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a value rendered as a string, whatever its stored type
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Remove a configuration value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get all keys
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let result = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        };
        result.map_err(|source| {
            StorageSystemError::SerializationError {
                format: format.extension().to_string(),
                source,
            }
            .into()
        })
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let result = match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        };
        result.map_err(|source| {
            StorageSystemError::DeserializationError {
                format: format.extension().to_string(),
                source,
            }
            .into()
        })
    }
}

/// String-valued host settings with explicit persistence.
///
/// The plugin manager uses this as the theme registry: `console.theme.<name>`
/// entries plus the current theme under `console.theme`.
pub trait SettingsStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str) -> Option<String>;
    /// Persist pending changes
    fn save(&self) -> Result<()>;
}

/// A settings file held in memory and written back on [`SettingsStore::save`].
#[derive(Debug)]
pub struct ConfigFile {
    provider: Arc<dyn StorageProvider>,
    path: PathBuf,
    format: ConfigFormat,
    data: RwLock<ConfigData>,
}

impl ConfigFile {
    /// Open a settings file. A missing or unreadable file yields empty settings.
    pub fn open(provider: Arc<dyn StorageProvider>, path: PathBuf) -> Result<Self> {
        let format = ConfigFormat::from_path(&path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat(path.display().to_string())
        })?;

        let data = if provider.is_file(&path) {
            match provider
                .read_to_string(&path)
                .and_then(|content| ConfigData::deserialize(&content, format))
            {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                    ConfigData::new()
                }
            }
        } else {
            ConfigData::new()
        };

        Ok(Self {
            provider,
            path,
            format,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current values
    pub fn data(&self) -> ConfigData {
        self.data.read().map(|d| d.clone()).unwrap_or_default()
    }
}

impl SettingsStore for ConfigFile {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get_string(key)
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut data) = self.data.write() {
            // Strings always serialize
            let _ = data.set(key, value);
        }
    }

    fn remove(&self, key: &str) -> Option<String> {
        let mut data = self.data.write().ok()?;
        let previous = data.get_string(key);
        data.remove(key);
        previous
    }

    fn save(&self) -> Result<()> {
        let content = self.data().serialize(self.format)?;
        self.provider.write_string(&self.path, &content)
    }
}

/// Paths and tunables the plugin host runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Installation directory, substituted for `$BASE`
    pub base_dir: PathBuf,
    /// Configuration directory, substituted for `$CONFIG`
    pub config_dir: PathBuf,
    pub plugins_enabled: bool,
    /// Console language used to pick localized link names
    pub language: String,
    /// Wait before re-checking a delayed client app with delay of one second or less
    pub retry_short: Duration,
    /// Wait before re-checking a delayed client app with a longer delay
    pub retry_long: Duration,
}

impl HostConfig {
    pub fn new(base_dir: PathBuf, config_dir: PathBuf) -> Self {
        Self {
            base_dir,
            config_dir,
            plugins_enabled: true,
            language: constants::DEFAULT_LANGUAGE.to_string(),
            retry_short: Duration::from_millis(constants::DEFAULT_RETRY_SHORT_MILLIS),
            retry_long: Duration::from_millis(constants::DEFAULT_RETRY_LONG_MILLIS),
        }
    }

    /// Overlay values found in the host settings.
    pub fn with_settings(mut self, settings: &dyn SettingsStore) -> Self {
        if let Some(v) = settings.get(constants::PLUGINS_ENABLED_KEY) {
            self.plugins_enabled = v.eq_ignore_ascii_case("true");
        }
        if let Some(lang) = settings.get(constants::LANGUAGE_KEY).filter(|l| !l.is_empty()) {
            self.language = lang;
        }
        if let Some(ms) = parse_millis(settings, constants::RETRY_SHORT_MILLIS_KEY) {
            self.retry_short = ms;
        }
        if let Some(ms) = parse_millis(settings, constants::RETRY_LONG_MILLIS_KEY) {
            self.retry_long = ms;
        }
        self
    }

    /// Root directory holding one subdirectory per installed plugin
    pub fn plugins_dir(&self) -> PathBuf {
        self.config_dir.join(constants::PLUGINS_DIR)
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir().join(name)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.config_dir.join(constants::PLUGIN_REGISTRY_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(constants::HOST_SETTINGS_FILE)
    }
}

fn parse_millis(settings: &dyn SettingsStore, key: &str) -> Option<Duration> {
    let raw = settings.get(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            log::warn!("Ignoring invalid value '{}' for setting {}", raw, key);
            None
        }
    }
}
