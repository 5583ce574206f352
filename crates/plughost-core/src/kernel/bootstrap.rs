use std::any::TypeId;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::{
    AppCatalog, DefaultPluginManager, HostServices, InMemoryNavRegistry, InMemoryWebAppHost, ResourceSearchPath,
    TokioJobQueue,
};
use crate::storage::{ConfigFile, HostConfig, LocalStorageProvider, StorageProvider};
use crate::utils::fs;

/// Main application struct coordinating components via dependency injection
pub struct Application {
    initialized: bool,
    config: HostConfig,
    dependencies: Arc<Mutex<DependencyRegistry>>,
    // Concrete TypeIds in initialization order
    component_init_order: Vec<TypeId>,
    plugin_manager: Arc<DefaultPluginManager>,
    catalog: Arc<AppCatalog>,
    settings: Arc<ConfigFile>,
}

impl Application {
    /// Wire the default host around `base_dir` (`$BASE`) and `config_dir` (`$CONFIG`).
    ///
    /// Must be called from within a Tokio runtime, which runs deferred jobs.
    pub fn new(base_dir: PathBuf, config_dir: PathBuf) -> Result<Self> {
        Self::with_settings_file(base_dir, config_dir, None)
    }

    /// Like [`Application::new`], reading host settings from `settings_file`
    /// instead of `host.json`. Relative paths are taken from `config_dir`; the
    /// extension picks the format (`json`, `yaml`/`yml` or `toml`).
    pub fn with_settings_file(base_dir: PathBuf, config_dir: PathBuf, settings_file: Option<PathBuf>) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let base_dir = fs::absolute(&base_dir);
        let config_dir = fs::absolute(&config_dir);
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(config_dir.clone()));

        let settings_path = config_dir.join(settings_file.unwrap_or_else(|| PathBuf::from(constants::HOST_SETTINGS_FILE)));
        log::debug!("Using host settings: {}", settings_path.display());
        let settings = Arc::new(ConfigFile::open(provider.clone(), settings_path)?);
        let config = HostConfig::new(base_dir, config_dir).with_settings(settings.as_ref());
        log::info!("Using base directory: {}", config.base_dir.display());
        log::info!("Using config directory: {}", config.config_dir.display());

        let catalog = Arc::new(AppCatalog::new());
        let services = HostServices {
            settings: settings.clone(),
            webapps: Arc::new(InMemoryWebAppHost::new()),
            nav: Arc::new(InMemoryNavRegistry::new()),
            translations: Arc::new(ResourceSearchPath::new()),
            jobs: Arc::new(TokioJobQueue::current()?),
            resolver: catalog.clone(),
        };

        let mut registry = DependencyRegistry::new();
        let mut init_order = Vec::new();

        let plugin_manager = Arc::new(DefaultPluginManager::new(config.clone(), provider, services));
        registry.register_instance(plugin_manager.clone());
        init_order.push(TypeId::of::<DefaultPluginManager>());

        Ok(Application {
            initialized: false,
            config,
            dependencies: Arc::new(Mutex::new(registry)),
            component_init_order: init_order,
            plugin_manager,
            catalog,
            settings,
        })
    }

    /// Gets a specific component instance by its concrete type T.
    pub async fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        let registry = self.dependencies.lock().await;
        registry.get_concrete::<T>()
    }

    /// Initialize and start all components, wait for `shutdown`, then stop them.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        if self.initialized {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::RunPreCheck,
                component_name: None,
                message: "Application already initialized".to_string(),
                source: None,
            });
        }

        self.initialize().await?;
        self.start().await?;
        self.initialized = true;
        log::info!("Application initialized and started successfully.");

        shutdown.await;
        log::info!("Shutdown requested");

        self.shutdown().await
    }

    /// Initialize all registered components in the predefined order.
    pub async fn initialize(&self) -> Result<()> {
        self.for_each_component(KernelLifecyclePhase::Initialize).await
    }

    /// Start all components in the predefined order.
    pub async fn start(&self) -> Result<()> {
        self.for_each_component(KernelLifecyclePhase::Start).await
    }

    async fn for_each_component(&self, phase: KernelLifecyclePhase) -> Result<()> {
        log::debug!("{} components...", phase);
        let registry = self.dependencies.lock().await;

        for type_id in &self.component_init_order {
            let Some(component) = registry.get_component_by_id(type_id) else {
                log::error!("Component instance not found in registry for {:?} during {}", type_id, phase);
                return Err(Error::KernelLifecycleError {
                    phase,
                    component_name: None,
                    message: "Instance missing from registry".to_string(),
                    source: None,
                });
            };
            log::debug!("{}: {}", phase, component.name());
            let result = match phase {
                KernelLifecyclePhase::Initialize => component.initialize().await,
                _ => component.start().await,
            };
            result.map_err(|e| Error::KernelLifecycleError {
                phase: phase.clone(),
                component_name: Some(component.name().to_string()),
                message: "Component failed".to_string(),
                source: Some(Box::new(e)),
            })?;
        }
        Ok(())
    }

    /// Shutdown all components in reverse order of initialization.
    pub async fn shutdown(&mut self) -> Result<()> {
        log::info!("Shutting down components...");
        let registry = self.dependencies.lock().await;

        for type_id in self.component_init_order.iter().rev() {
            if let Some(component) = registry.get_component_by_id(type_id) {
                log::info!("Stopping component: {}", component.name());
                if let Err(e) = component.stop().await {
                    log::error!("Error stopping component {}: {}", component.name(), e);
                    return Err(Error::KernelLifecycleError {
                        phase: KernelLifecyclePhase::Shutdown,
                        component_name: Some(component.name().to_string()),
                        message: "Component failed to stop".to_string(),
                        source: Some(Box::new(e)),
                    });
                }
            } else {
                log::warn!("Component instance not found in registry for {:?} during stop.", type_id);
            }
        }
        self.initialized = false;
        log::info!("Component shutdown complete.");
        Ok(())
    }

    /// Returns whether the application has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn plugin_manager(&self) -> Arc<DefaultPluginManager> {
        self.plugin_manager.clone()
    }

    /// Built-in client apps, resolvable from every plugin
    pub fn app_catalog(&self) -> Arc<AppCatalog> {
        self.catalog.clone()
    }

    pub fn settings(&self) -> Arc<ConfigFile> {
        self.settings.clone()
    }
}
