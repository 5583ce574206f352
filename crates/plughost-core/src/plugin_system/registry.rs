use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::kernel::constants;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::PluginProperties;
use crate::storage::{Properties, StorageProvider};

/// An installed plugin, as seen on disk and in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    /// Unique name, equal to the plugin's directory name
    pub name: String,
    pub directory: PathBuf,
    pub enabled: bool,
    pub manifest: PluginProperties,
}

/// The persisted plugin registry (`plugins.config`).
///
/// Holds one `plugin.<name>.startOnLoad` entry per plugin. Reads never fail:
/// an unreadable file is logged and treated as empty, and every plugin
/// directory without an entry gets a default `true`. Updates are
/// read-modify-write, so callers serialize concurrent changes to one plugin.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    provider: Arc<dyn StorageProvider>,
    registry_path: PathBuf,
    plugins_dir: PathBuf,
}

impl PluginRegistry {
    pub fn new(provider: Arc<dyn StorageProvider>, registry_path: PathBuf, plugins_dir: PathBuf) -> Self {
        Self {
            provider,
            registry_path,
            plugins_dir,
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir.join(name)
    }

    /// Registry key holding the enabled flag of `name`
    pub fn enabled_key(name: &str) -> String {
        format!("{}{}{}", constants::REGISTRY_PREFIX, name, constants::REGISTRY_ENABLED_SUFFIX)
    }

    /// Names of all installed plugins, enabled or not, sorted.
    pub fn installed_plugins(&self) -> Vec<String> {
        let entries = match self.provider.read_dir(&self.plugins_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("No plugin directory at {}: {}", self.plugins_dir.display(), e);
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|p| self.provider.is_dir(p))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    fn try_load(&self) -> std::result::Result<Properties, PluginSystemError> {
        if !self.provider.is_file(&self.registry_path) {
            return Ok(Properties::new());
        }
        Properties::load(self.provider.as_ref(), &self.registry_path).map_err(|e| self.persistence_error(e))
    }

    fn persistence_error(&self, e: crate::kernel::error::Error) -> PluginSystemError {
        let source = match e {
            crate::kernel::error::Error::StorageSystem(s) => s,
            other => crate::storage::error::StorageSystemError::OperationFailed {
                operation: "registry".to_string(),
                path: Some(self.registry_path.clone()),
                message: other.to_string(),
            },
        };
        PluginSystemError::Persistence {
            path: self.registry_path.clone(),
            source: Box::new(source),
        }
    }

    /// Load the registry, adding a default enabled entry for every installed plugin.
    pub fn load(&self) -> Properties {
        let mut props = self.try_load().unwrap_or_else(|e| {
            log::error!("{}", e);
            Properties::new()
        });
        for name in self.installed_plugins() {
            let key = Self::enabled_key(&name);
            if !props.contains_key(&key) {
                props.set(key, "true");
            }
        }
        props
    }

    /// Persist the registry. Failures are logged, never returned.
    pub fn store(&self, props: &Properties) {
        if let Err(e) = props.store(self.provider.as_ref(), &self.registry_path) {
            log::error!("{}", self.persistence_error(e));
        }
    }

    /// Names with `startOnLoad=true`, sorted
    pub fn enabled_plugins(&self) -> Vec<String> {
        let prefix = constants::REGISTRY_PREFIX;
        let suffix = constants::REGISTRY_ENABLED_SUFFIX;
        self.load()
            .iter()
            .filter(|(key, value)| key.starts_with(prefix) && key.ends_with(suffix) && value.eq_ignore_ascii_case("true"))
            .filter_map(|(key, _)| key.get(prefix.len()..key.len() - suffix.len()))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.load().get_bool(&Self::enabled_key(name)).unwrap_or(true)
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) {
        let mut props = self.load();
        props.set(Self::enabled_key(name), enabled.to_string());
        self.store(&props);
    }

    /// Remove every `plugin.<name>.*` entry and persist. Returns how many went.
    pub fn remove_plugin(&self, name: &str) -> usize {
        let mut props = self.load();
        let removed = props.remove_prefixed(&format!("{}{}.", constants::REGISTRY_PREFIX, name));
        self.store(&props);
        removed
    }

    /// Full record for an installed plugin
    pub fn plugin(&self, name: &str) -> Option<Plugin> {
        let directory = self.plugin_dir(name);
        if !self.provider.is_dir(&directory) {
            return None;
        }
        let manifest = PluginProperties::load_or_default(
            self.provider.as_ref(),
            &directory.join(constants::PLUGIN_MANIFEST_FILE),
        );
        Some(Plugin {
            name: name.to_string(),
            enabled: self.is_enabled(name),
            directory,
            manifest,
        })
    }
}
