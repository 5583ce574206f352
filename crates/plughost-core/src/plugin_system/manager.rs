use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::host::{NavRegistry, TranslationCatalog, WebAppHost};
use crate::plugin_system::jobs::JobQueue;
use crate::plugin_system::loader::ClassResolver;
use crate::plugin_system::manifest::{ClientAppSpec, PluginProperties};
use crate::plugin_system::registry::{Plugin, PluginRegistry};
use crate::plugin_system::running::RunningStateTracker;
use crate::plugin_system::scheduler::{ClientAction, ClientAppScheduler};
use crate::plugin_system::scope::ScopeCache;
use crate::storage::{HostConfig, Properties, SettingsStore, StorageProvider};
use crate::utils::fs;

/// Plugin lifecycle component interface
#[async_trait]
pub trait PluginManager: KernelComponent {
    /// Start every enabled plugin. Per-plugin faults are logged; returns how many started.
    async fn start_all(&self) -> usize;

    /// Start one plugin: themes, client apps, webapps, translations and console link
    async fn start_plugin(&self, name: &str) -> Result<()>;

    /// Run the stop action of every client app that declares one and stop the plugin's webapps
    async fn stop_plugin(&self, name: &str) -> Result<()>;

    /// Uninstall and remove a plugin. The plugin should be stopped first.
    async fn delete_plugin(&self, name: &str) -> Result<()>;

    /// Whether any thread, deferred job or webapp of the plugin is active
    fn is_plugin_running(&self, name: &str) -> bool;

    /// Persist the plugin's start-on-load flag
    fn set_plugin_enabled(&self, name: &str, enabled: bool) -> Result<()>;

    /// Installed plugin names, sorted
    fn installed_plugins(&self) -> Vec<String>;

    /// Records of all installed plugins
    fn plugins(&self) -> Vec<Plugin>;

    /// Signing public key to signer, for every plugin declaring a well-formed key
    fn plugin_keys(&self) -> BTreeMap<String, String>;
}

/// Host services the manager drives.
#[derive(Debug, Clone)]
pub struct HostServices {
    /// Host settings; doubles as the theme registry
    pub settings: Arc<dyn SettingsStore>,
    pub webapps: Arc<dyn WebAppHost>,
    pub nav: Arc<dyn NavRegistry>,
    pub translations: Arc<dyn TranslationCatalog>,
    pub jobs: Arc<dyn JobQueue>,
    pub resolver: Arc<dyn ClassResolver>,
}

/// Default implementation of plugin manager
pub struct DefaultPluginManager {
    name: &'static str,
    config: HostConfig,
    provider: Arc<dyn StorageProvider>,
    registry: PluginRegistry,
    settings: Arc<dyn SettingsStore>,
    webapps: Arc<dyn WebAppHost>,
    nav: Arc<dyn NavRegistry>,
    translations: Arc<dyn TranslationCatalog>,
    scheduler: ClientAppScheduler,
}

impl DefaultPluginManager {
    /// Create a manager with a fresh scope cache and running-state tracker
    pub fn new(config: HostConfig, provider: Arc<dyn StorageProvider>, services: HostServices) -> Self {
        let scopes = Arc::new(ScopeCache::new());
        let running = Arc::new(RunningStateTracker::new(services.jobs, services.webapps.clone()));
        let scheduler = ClientAppScheduler::new(&config, scopes, running, services.resolver);
        let registry = PluginRegistry::new(provider.clone(), config.registry_path(), config.plugins_dir());
        Self {
            name: "DefaultPluginManager",
            config,
            provider,
            registry,
            settings: services.settings,
            webapps: services.webapps,
            nav: services.nav,
            translations: services.translations,
            scheduler,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &ClientAppScheduler {
        &self.scheduler
    }

    pub fn running(&self) -> &Arc<RunningStateTracker> {
        self.scheduler.running()
    }

    pub fn scopes(&self) -> &Arc<ScopeCache> {
        self.scheduler.scopes()
    }

    /// Directory of an installed plugin, or `NotFound`
    fn installed_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.registry.plugin_dir(name);
        if name.is_empty() || !self.provider.is_dir(&dir) {
            log::error!("Cannot find plugin {} at {}", name, dir.display());
            return Err(PluginSystemError::not_found(name).into());
        }
        Ok(dir)
    }

    fn manifest(&self, plugin_dir: &Path) -> PluginProperties {
        PluginProperties::load_or_default(self.provider.as_ref(), &plugin_dir.join(constants::PLUGIN_MANIFEST_FILE))
    }

    /// Client apps declared by the plugin; empty when it has no client manifest
    fn client_apps(&self, plugin_dir: &Path) -> Result<Vec<ClientAppSpec>> {
        let path = plugin_dir.join(constants::CLIENTS_MANIFEST_FILE);
        if !self.provider.is_file(&path) {
            return Ok(Vec::new());
        }
        ClientAppSpec::load_all(self.provider.as_ref(), &path)
    }

    /// Non-standard theme directories shipped by the plugin, as (name, path)
    fn plugin_themes(&self, plugin_dir: &Path) -> Vec<(String, PathBuf)> {
        let themes_dir = plugin_dir.join(constants::THEMES_DIR);
        fs::list_subdirs(&themes_dir)
            .unwrap_or_else(|e| {
                log::warn!("Cannot list themes in {}: {}", themes_dir.display(), e);
                Vec::new()
            })
            .into_iter()
            .filter_map(|dir| fs::file_name(&dir).map(|name| (name, dir)))
            .filter(|(name, _)| {
                let standard = constants::STANDARD_THEMES.contains(&name.as_str());
                if standard {
                    log::warn!("Skipping theme {}, it shadows a standard theme", name);
                }
                !standard
            })
            .collect()
    }

    /// Packaged webapps shipped by the plugin that do not collide with standard ones, as (name, path)
    fn plugin_webapps(&self, plugin_dir: &Path) -> Vec<(String, PathBuf)> {
        let webapps_dir = plugin_dir.join(constants::WEBAPPS_DIR);
        fs::files_with_extensions(&webapps_dir, &[constants::WEBAPP_EXTENSION])
            .unwrap_or_else(|e| {
                log::warn!("Cannot list webapps in {}: {}", webapps_dir.display(), e);
                Vec::new()
            })
            .into_iter()
            .filter_map(|path| fs::file_stem(&path).map(|name| (name, path)))
            .filter(|(name, _)| {
                let standard = constants::STANDARD_WEBAPPS.contains(&name.as_str());
                if standard {
                    log::warn!("Skipping webapp {}, it would replace a standard webapp", name);
                }
                !standard
            })
            .collect()
    }

    /// `console/webapps.config` of the plugin, empty if absent or unreadable
    fn webapp_flags(&self, plugin_dir: &Path) -> Properties {
        let path = plugin_dir.join(constants::CONSOLE_DIR).join(constants::WEBAPPS_CONFIG_FILE);
        if !self.provider.is_file(&path) {
            return Properties::new();
        }
        Properties::load(self.provider.as_ref(), &path).unwrap_or_else(|e| {
            log::warn!("Cannot read {}: {}", path.display(), e);
            Properties::new()
        })
    }

    fn register_themes(&self, plugin: &str, plugin_dir: &Path) {
        for (theme, dir) in self.plugin_themes(plugin_dir) {
            let dir = fs::absolute(&dir);
            log::info!("Plugin {} adds theme {}", plugin, theme);
            self.settings
                .set(&format!("{}{}", constants::THEME_PREFIX, theme), &dir.to_string_lossy());
        }
    }

    /// Remove the plugin's theme registrations; reset the current theme if it was one of them.
    fn unregister_themes(&self, plugin: &str, plugin_dir: &Path) {
        let current = self.settings.get(constants::CURRENT_THEME_KEY);
        let mut changed = false;
        for (theme, _) in self.plugin_themes(plugin_dir) {
            if self.settings.remove(&format!("{}{}", constants::THEME_PREFIX, theme)).is_some() {
                changed = true;
            }
            if current.as_deref() == Some(theme.as_str()) {
                log::info!("Theme {} of plugin {} was current, switching to {}", theme, plugin, constants::DEFAULT_THEME);
                self.settings.set(constants::CURRENT_THEME_KEY, constants::DEFAULT_THEME);
                changed = true;
            }
        }
        if changed {
            if let Err(e) = self.settings.save() {
                log::error!("Cannot save settings after removing themes of {}: {}", plugin, e);
            }
        }
    }

    fn start_webapps(&self, plugin: &str, plugin_dir: &Path) {
        let webapps = self.plugin_webapps(plugin_dir);
        if webapps.is_empty() {
            return;
        }
        let flags = self.webapp_flags(plugin_dir);
        let state = self.running().state(plugin);
        for (name, path) in webapps {
            let key = format!("{}{}{}", constants::WEBAPP_PREFIX, name, constants::REGISTRY_ENABLED_SUFFIX);
            if flags.get_bool(&key) == Some(false) {
                log::info!("Webapp {} of plugin {} is disabled", name, plugin);
                continue;
            }
            match self.webapps.start_web_app(&name, &path) {
                Ok(()) => state.add_webapp(&name),
                Err(e) => log::error!("Cannot start webapp {} of plugin {}: {}", name, plugin, e),
            }
        }
    }

    /// Add the plugin's translation bundles to the search path; true if any were added.
    fn add_translations(&self, plugin: &str, plugin_dir: &Path) -> bool {
        let locale_dir = plugin_dir.join(constants::LOCALE_DIR);
        let bundles = fs::files_with_extensions(&locale_dir, constants::TRANSLATION_EXTENSIONS).unwrap_or_else(|e| {
            log::warn!("Cannot list translations in {}: {}", locale_dir.display(), e);
            Vec::new()
        });
        let mut added = false;
        for bundle in bundles {
            match self.translations.add_resource_path(&fs::absolute(&bundle)) {
                Ok(()) => added = true,
                Err(e) => log::error!("Cannot add translation {} of plugin {}: {}", bundle.display(), plugin, e),
            }
        }
        if added {
            self.translations.clear_cache();
        }
        added
    }

    async fn stop_running_plugins(&self) {
        for name in self.registry.installed_plugins() {
            if !self.running().is_running(&name) {
                continue;
            }
            if let Err(e) = self.stop_plugin(&name).await {
                log::error!("Error stopping plugin {}: {}", name, e);
            }
        }
    }
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DefaultPluginManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        let plugins_dir = self.config.plugins_dir();
        if !self.provider.is_dir(&plugins_dir) {
            self.provider.create_dir_all(&plugins_dir)?;
        }
        log::info!("Plugin directory: {}", plugins_dir.display());
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let started = self.start_all().await;
        log::info!("{} plugin(s) started", started);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_running_plugins().await;
        Ok(())
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn start_all(&self) -> usize {
        if !self.config.plugins_enabled {
            log::info!("Plugins are disabled, not starting any");
            return 0;
        }

        let mut started = 0;
        for name in self.registry.enabled_plugins() {
            log::info!("Starting plugin {}", name);
            match std::panic::AssertUnwindSafe(self.start_plugin(&name)).catch_unwind().await {
                Ok(Ok(())) => started += 1,
                Ok(Err(e)) => log::error!("Error starting plugin {}: {}", name, e),
                Err(_) => log::error!("Plugin {} panicked while starting", name),
            }
        }
        started
    }

    async fn start_plugin(&self, name: &str) -> Result<()> {
        let plugin_dir = self.installed_dir(name)?;

        self.register_themes(name, &plugin_dir);

        let apps = self.client_apps(&plugin_dir)?;
        self.scheduler.dispatch_all(&plugin_dir, &apps, ClientAction::Start).await?;

        self.start_webapps(name, &plugin_dir);
        self.add_translations(name, &plugin_dir);

        if let Some(link) = self.manifest(&plugin_dir).console_link(&self.config.language) {
            self.nav.register_app(&link.name, &link.url, link.tooltip.as_deref());
        }
        Ok(())
    }

    async fn stop_plugin(&self, name: &str) -> Result<()> {
        let plugin_dir = self.installed_dir(name)?;

        let apps = self.client_apps(&plugin_dir)?;
        self.scheduler.dispatch_all(&plugin_dir, &apps, ClientAction::Stop).await?;

        for (webapp, _) in self.plugin_webapps(&plugin_dir) {
            self.webapps.stop_web_app(&webapp);
        }

        if let Some(link_name) = self.manifest(&plugin_dir).console_link_name(&self.config.language) {
            self.nav.unregister_app(&link_name);
        }
        log::info!("Stopped plugin {}", name);
        Ok(())
    }

    async fn delete_plugin(&self, name: &str) -> Result<()> {
        let plugin_dir = self.installed_dir(name)?;

        let apps = self.client_apps(&plugin_dir)?;
        self.scheduler.dispatch_all(&plugin_dir, &apps, ClientAction::Uninstall).await?;
        let dropped = self.scopes().invalidate_plugin(name);
        log::debug!("Dropped {} cached scope(s) of plugin {}", dropped, name);

        self.unregister_themes(name, &plugin_dir);

        self.provider.remove_dir_all(&plugin_dir)?;
        let removed = self.registry.remove_plugin(name);
        log::info!("Deleted plugin {} ({} registry entries removed)", name, removed);
        Ok(())
    }

    fn is_plugin_running(&self, name: &str) -> bool {
        self.running().is_running(name)
    }

    fn set_plugin_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.installed_dir(name)?;
        self.registry.set_enabled(name, enabled);
        Ok(())
    }

    fn installed_plugins(&self) -> Vec<String> {
        self.registry.installed_plugins()
    }

    fn plugins(&self) -> Vec<Plugin> {
        self.registry
            .installed_plugins()
            .iter()
            .filter_map(|name| self.registry.plugin(name))
            .collect()
    }

    fn plugin_keys(&self) -> BTreeMap<String, String> {
        let mut keys = BTreeMap::new();
        for name in self.registry.installed_plugins() {
            let plugin_dir = self.registry.plugin_dir(&name);
            if let Some((key, signer)) = self.manifest(&plugin_dir).signing_key() {
                keys.insert(key, signer);
            }
        }
        keys
    }
}

