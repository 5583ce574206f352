//! Host services the plugin manager drives but does not own.
//!
//! Each service is a trait so a host can plug in its real web server,
//! navigation bar or translation loader. The in-memory implementations here
//! keep enough state to be queried, which is what the command-line host and
//! the tests use.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::kernel::error::Result;

/// Embedded web application host
pub trait WebAppHost: Send + Sync + Debug {
    fn start_web_app(&self, name: &str, package_path: &Path) -> Result<()>;
    fn stop_web_app(&self, name: &str);
    fn is_web_app_running(&self, name: &str) -> bool;
}

/// Console navigation links
pub trait NavRegistry: Send + Sync + Debug {
    fn register_app(&self, name: &str, url: &str, tooltip: Option<&str>);
    fn unregister_app(&self, name: &str);
}

/// Global translation resource search path
pub trait TranslationCatalog: Send + Sync + Debug {
    fn add_resource_path(&self, path: &Path) -> Result<()>;
    /// Forget cached translations so new resources are picked up
    fn clear_cache(&self);
}

/// Tracks deployed webapps without serving them.
#[derive(Debug, Default)]
pub struct InMemoryWebAppHost {
    running: RwLock<BTreeMap<String, PathBuf>>,
}

impl InMemoryWebAppHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_apps(&self) -> Vec<String> {
        self.running.read().map(|r| r.keys().cloned().collect()).unwrap_or_default()
    }
}

impl WebAppHost for InMemoryWebAppHost {
    fn start_web_app(&self, name: &str, package_path: &Path) -> Result<()> {
        log::info!("Deploying webapp {} from {}", name, package_path.display());
        if let Ok(mut running) = self.running.write() {
            running.insert(name.to_string(), package_path.to_path_buf());
        }
        Ok(())
    }

    fn stop_web_app(&self, name: &str) {
        if let Ok(mut running) = self.running.write() {
            if running.remove(name).is_some() {
                log::info!("Stopped webapp {}", name);
            }
        }
    }

    fn is_web_app_running(&self, name: &str) -> bool {
        self.running.read().map(|r| r.contains_key(name)).unwrap_or(false)
    }
}

/// Console link table
#[derive(Debug, Default)]
pub struct InMemoryNavRegistry {
    links: RwLock<BTreeMap<String, (String, Option<String>)>>,
}

impl InMemoryNavRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL and tooltip registered under `name`
    pub fn link(&self, name: &str) -> Option<(String, Option<String>)> {
        self.links.read().ok()?.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.links.read().map(|l| l.keys().cloned().collect()).unwrap_or_default()
    }
}

impl NavRegistry for InMemoryNavRegistry {
    fn register_app(&self, name: &str, url: &str, tooltip: Option<&str>) {
        if let Ok(mut links) = self.links.write() {
            links.insert(name.to_string(), (url.to_string(), tooltip.map(str::to_string)));
        }
    }

    fn unregister_app(&self, name: &str) {
        if let Ok(mut links) = self.links.write() {
            links.remove(name);
        }
    }
}

/// Ordered list of translation resource paths with a cache generation counter
#[derive(Debug, Default)]
pub struct ResourceSearchPath {
    paths: RwLock<BTreeSet<PathBuf>>,
    generation: RwLock<u64>,
}

impl ResourceSearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().map(|p| p.iter().cloned().collect()).unwrap_or_default()
    }

    /// Bumped on every cache clear
    pub fn generation(&self) -> u64 {
        self.generation.read().map(|g| *g).unwrap_or(0)
    }
}

impl TranslationCatalog for ResourceSearchPath {
    fn add_resource_path(&self, path: &Path) -> Result<()> {
        if let Ok(mut paths) = self.paths.write() {
            paths.insert(path.to_path_buf());
        }
        Ok(())
    }

    fn clear_cache(&self) {
        if let Ok(mut generation) = self.generation.write() {
            *generation += 1;
        }
    }
}
