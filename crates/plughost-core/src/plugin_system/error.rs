//! # Plughost Plugin System Errors
//!
//! Defines [`PluginSystemError`], covering every failure the plugin lifecycle
//! can report: missing plugins, unresolvable client apps, bad manifests,
//! client app faults and registry persistence problems.
//!
//! Some of these are never surfaced to callers. `InvalidArgument` (a relative
//! classpath entry) and `Persistence` (registry or manifest I/O) are logged and
//! the operation continues with the entry skipped or with default data.
use std::path::PathBuf;

use crate::storage::error::StorageSystemError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin '{plugin}' is not installed")]
    NotFound { plugin: String },

    #[error("Client app '{class_name}' of plugin '{plugin}' cannot be loaded: {reason}")]
    NotLoadable {
        plugin: String,
        class_name: String,
        reason: String,
    },

    #[error("Invalid argument for client '{client}': {message}")]
    InvalidArgument { client: String, message: String },

    #[error("Plugin manifest error for '{path}': {message}")]
    ManifestError { path: PathBuf, message: String },

    #[error("Client app '{class_name}' of plugin '{plugin}' failed: {message}")]
    ClientAppFailed {
        plugin: String,
        class_name: String,
        message: String,
    },

    #[error("Failed to schedule work for plugin '{plugin}': {message}")]
    SchedulingError { plugin: String, message: String },

    #[error("Plugin registry persistence failed for '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<StorageSystemError>,
    },
}

impl PluginSystemError {
    pub fn not_found(plugin: impl Into<String>) -> Self {
        PluginSystemError::NotFound { plugin: plugin.into() }
    }

    pub fn not_loadable(plugin: &str, class_name: &str, reason: impl Into<String>) -> Self {
        PluginSystemError::NotLoadable {
            plugin: plugin.to_string(),
            class_name: class_name.to_string(),
            reason: reason.into(),
        }
    }
}
