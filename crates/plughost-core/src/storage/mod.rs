pub mod provider;
pub mod local;
pub mod properties;
pub mod config;
pub mod error;

/// Re-export key types
pub use provider::StorageProvider;
pub use local::LocalStorageProvider;
pub use properties::Properties;
pub use config::{ConfigData, ConfigFile, ConfigFormat, HostConfig, SettingsStore};

// Test module declaration
#[cfg(test)]
mod tests;
