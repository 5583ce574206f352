//! Plain `key=value` property files.
//!
//! Used for the plugin registry (`plugins.config`), each plugin's manifest
//! (`plugin.config`), its client app list (`clients.config`) and webapp
//! switches. Lines starting with `#` or `;` are comments, the first `=` splits
//! key from value and both sides are trimmed. Files are written back sorted by
//! key.
use std::collections::BTreeMap;
use std::path::Path;

use crate::kernel::error::Result;
use crate::storage::provider::StorageProvider;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse property text. Lines without `=` are ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    entries.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        Self { entries }
    }

    /// Load a property file through a storage provider.
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let text = provider.read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Store the properties, replacing the file atomically.
    pub fn store(&self, provider: &dyn StorageProvider, path: &Path) -> Result<()> {
        provider.write_string(path, &self.to_text())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Boolean lookup: only a case-insensitive `true` counts as true.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove every key starting with `prefix`, returning how many were removed.
    pub fn remove_prefixed(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
