use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::{ConfigData, ConfigFile, ConfigFormat, HostConfig, SettingsStore, StorageProvider};

fn provider_in(dir: &std::path::Path) -> Arc<dyn StorageProvider> {
    Arc::new(LocalStorageProvider::new(dir.to_path_buf()))
}

#[test]
fn test_config_data_get_set() -> Result<()> {
    let mut data = ConfigData::new();
    data.set("console.theme", "dark")?;
    data.set("plugins.retry.shortMillis", 250)?;

    assert_eq!(data.get::<String>("console.theme"), Some("dark".to_string()));
    assert_eq!(data.get_string("plugins.retry.shortMillis"), Some("250".to_string()));
    assert_eq!(data.get_or("missing", 7u32), 7);
    assert!(data.contains_key("console.theme"));
    assert_eq!(data.keys().len(), 2);

    data.remove("console.theme");
    assert!(!data.contains_key("console.theme"));
    Ok(())
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(&PathBuf::from("host.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(&PathBuf::from("host.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(&PathBuf::from("host.ini")), None);
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(&PathBuf::from("host.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(&PathBuf::from("host.toml")), Some(ConfigFormat::Toml));
}

#[test]
fn test_json_round_trip() -> Result<()> {
    let mut data = ConfigData::new();
    data.set("console.theme.ocean", "/tmp/ocean")?;
    let text = data.serialize(ConfigFormat::Json)?;
    assert_eq!(ConfigData::deserialize(&text, ConfigFormat::Json)?, data);
    Ok(())
}

#[test]
fn test_config_file_missing_is_empty_and_saves() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("host.json");
    let file = ConfigFile::open(provider_in(temp_dir.path()), path.clone())?;

    assert_eq!(file.get("console.theme"), None);
    file.set("console.theme", "midnight");
    assert!(!path.exists(), "set alone does not persist");

    file.save()?;
    let reopened = ConfigFile::open(provider_in(temp_dir.path()), path)?;
    assert_eq!(reopened.get("console.theme"), Some("midnight".to_string()));
    assert_eq!(reopened.remove("console.theme"), Some("midnight".to_string()));
    assert_eq!(reopened.get("console.theme"), None);
    Ok(())
}

#[test]
fn test_config_file_unreadable_is_empty() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("host.json");
    std::fs::write(&path, "{ not json").unwrap();

    let file = ConfigFile::open(provider_in(temp_dir.path()), path)?;
    assert!(file.data().keys().is_empty());
    Ok(())
}

#[test]
fn test_config_file_rejects_unknown_format() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let err = ConfigFile::open(provider_in(temp_dir.path()), temp_dir.path().join("host.ini")).unwrap_err();
    assert!(matches!(err, Error::StorageSystem(StorageSystemError::UnsupportedConfigFormat(_))));
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_config_file_yaml() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("host.yaml");
    std::fs::write(&path, "console.lang: fr\n").unwrap();

    let file = ConfigFile::open(provider_in(temp_dir.path()), path)?;
    assert_eq!(file.get("console.lang"), Some("fr".to_string()));
    Ok(())
}

#[test]
fn test_host_config_defaults_and_paths() {
    let config = HostConfig::new(PathBuf::from("/opt/host"), PathBuf::from("/etc/host"));
    assert!(config.plugins_enabled);
    assert_eq!(config.language, "en");
    assert_eq!(config.retry_short, Duration::from_millis(1000));
    assert_eq!(config.retry_long, Duration::from_millis(2000));
    assert_eq!(config.plugins_dir(), PathBuf::from("/etc/host/plugins"));
    assert_eq!(config.plugin_dir("foo"), PathBuf::from("/etc/host/plugins/foo"));
    assert_eq!(config.registry_path(), PathBuf::from("/etc/host/plugins.config"));
    assert_eq!(config.settings_path(), PathBuf::from("/etc/host/host.json"));
}

#[test]
fn test_host_config_with_settings() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let file = ConfigFile::open(provider_in(temp_dir.path()), temp_dir.path().join("host.json"))?;
    file.set("plugins.enabled", "False");
    file.set("plugins.retry.longMillis", "5");
    file.set("plugins.retry.shortMillis", "soon");

    let config = HostConfig::new(PathBuf::from("/b"), PathBuf::from("/c")).with_settings(&file);
    assert!(!config.plugins_enabled);
    assert_eq!(config.retry_long, Duration::from_millis(5));
    // Invalid values keep the default
    assert_eq!(config.retry_short, Duration::from_millis(1000));
    Ok(())
}
