//! Fixtures shared by the plugin system tests.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tempfile::{tempdir, TempDir};

use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::host::{InMemoryNavRegistry, InMemoryWebAppHost, ResourceSearchPath};
use crate::plugin_system::jobs::{JobQueue, JobState, JobWork, ScheduledJob};
use crate::plugin_system::loader::{AppCatalog, ClassResolver, ClientApp};
use crate::plugin_system::manager::{DefaultPluginManager, HostServices};
use crate::plugin_system::scope::ExecutionScope;
use crate::storage::{ConfigFile, HostConfig, LocalStorageProvider, StorageProvider};

pub fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Arguments of every run of a recording client app
pub type Calls = Arc<Mutex<Vec<Vec<String>>>>;

pub fn recorder() -> (Arc<dyn ClientApp>, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let app: Arc<dyn ClientApp> = Arc::new(move |args: &[String]| -> Result<()> {
        sink.lock().unwrap().push(args.to_vec());
        Ok(())
    });
    (app, calls)
}

pub fn failing(message: &'static str) -> Arc<dyn ClientApp> {
    Arc::new(move |_: &[String]| -> Result<()> { Err(Error::from(message)) })
}

/// Wait until `calls` holds at least `n` runs, or give up after a few seconds.
pub fn wait_for_calls(calls: &Calls, n: usize) -> Vec<Vec<String>> {
    for _ in 0..500 {
        let snapshot = calls.lock().unwrap().clone();
        if snapshot.len() >= n {
            return snapshot;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    calls.lock().unwrap().clone()
}

/// A latch client apps block on until the test opens it.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, cvar) = &*self.0;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (open, cvar) = &*self.0;
        let mut guard = open.lock().unwrap();
        while !*guard {
            guard = cvar.wait(guard).unwrap();
        }
    }

    /// Client app that blocks until the gate opens
    pub fn app(&self) -> Arc<dyn ClientApp> {
        let gate = self.clone();
        Arc::new(move |_: &[String]| -> Result<()> {
            gate.wait();
            Ok(())
        })
    }
}

/// Wait until `cond` holds, or give up after a few seconds.
pub fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// Resolver failing the first `failures` lookups, then delegating to a catalog.
///
/// Classes registered with [`FlakyResolver::register_scoped`] only resolve
/// inside an execution scope, like code shipped on a plugin's classpath.
#[derive(Debug)]
pub struct FlakyResolver {
    pub catalog: AppCatalog,
    scoped: AppCatalog,
    scope_entries: Mutex<Vec<Vec<PathBuf>>>,
    failures: AtomicUsize,
    pub lookups: AtomicUsize,
}

impl FlakyResolver {
    pub fn new(failures: usize) -> Self {
        Self {
            catalog: AppCatalog::new(),
            scoped: AppCatalog::new(),
            scope_entries: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn register_scoped(&self, class_name: &str, app: Arc<dyn ClientApp>) {
        self.scoped.register(class_name, app);
    }

    /// Entries of every scope a scoped class was resolved from
    pub fn scope_entries(&self) -> Vec<Vec<PathBuf>> {
        self.scope_entries.lock().unwrap().clone()
    }
}

impl ClassResolver for FlakyResolver {
    fn resolve(
        &self,
        class_name: &str,
        scope: Option<&ExecutionScope>,
    ) -> std::result::Result<Arc<dyn ClientApp>, PluginSystemError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PluginSystemError::not_loadable("<test>", class_name, "not yet"));
        }
        if let Some(scope) = scope {
            if let Ok(app) = self.scoped.resolve(class_name, None) {
                self.scope_entries.lock().unwrap().push(scope.entries().to_vec());
                return Ok(app);
            }
        }
        self.catalog.resolve(class_name, scope)
    }
}

/// Job queue that holds jobs until the test fires them.
#[derive(Debug, Default)]
pub struct ManualJobQueue {
    pending: Mutex<Vec<(Arc<ScheduledJob>, JobWorkSlot)>>,
}

pub struct JobWorkSlot(JobWork);

impl std::fmt::Debug for JobWorkSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JobWork")
    }
}

impl ManualJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Run every queued job on the calling thread.
    pub fn fire_all(&self) -> usize {
        let jobs: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let fired = jobs.len();
        for (job, JobWorkSlot(work)) in jobs {
            job.set_state(JobState::Running);
            work();
            job.set_state(JobState::Finished);
        }
        fired
    }
}

impl JobQueue for ManualJobQueue {
    fn add_job(&self, job: Arc<ScheduledJob>, work: JobWork) -> Result<()> {
        self.pending.lock().unwrap().push((job, JobWorkSlot(work)));
        Ok(())
    }

    fn is_job_active(&self, job: &ScheduledJob) -> bool {
        job.state() != JobState::Finished
    }
}

/// A manager over temporary base and config directories with in-memory host services.
pub struct Fixture {
    pub _base: TempDir,
    pub config_dir: TempDir,
    pub manager: DefaultPluginManager,
    pub catalog: Arc<FlakyResolver>,
    pub jobs: Arc<ManualJobQueue>,
    pub webapps: Arc<InMemoryWebAppHost>,
    pub nav: Arc<InMemoryNavRegistry>,
    pub translations: Arc<ResourceSearchPath>,
    pub settings: Arc<ConfigFile>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut HostConfig)) -> Self {
        let base = tempdir().unwrap();
        let config_dir = tempdir().unwrap();
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(config_dir.path().to_path_buf()));

        let mut config = HostConfig::new(base.path().to_path_buf(), config_dir.path().to_path_buf());
        config.retry_short = Duration::from_millis(10);
        config.retry_long = Duration::from_millis(20);
        tweak(&mut config);

        let settings = Arc::new(ConfigFile::open(provider.clone(), config.settings_path()).unwrap());
        let catalog = Arc::new(FlakyResolver::new(0));
        let jobs = Arc::new(ManualJobQueue::new());
        let webapps = Arc::new(InMemoryWebAppHost::new());
        let nav = Arc::new(InMemoryNavRegistry::new());
        let translations = Arc::new(ResourceSearchPath::new());

        let services = HostServices {
            settings: settings.clone(),
            webapps: webapps.clone(),
            nav: nav.clone(),
            translations: translations.clone(),
            jobs: jobs.clone(),
            resolver: catalog.clone(),
        };
        let manager = DefaultPluginManager::new(config, provider, services);
        Self {
            _base: base,
            config_dir,
            manager,
            catalog,
            jobs,
            webapps,
            nav,
            translations,
            settings,
        }
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.config_dir.path().join("plugins").join(name)
    }

    /// Create a plugin directory, with a `clients.config` when `clients` is given.
    pub fn install(&self, name: &str, clients: Option<&str>) -> PathBuf {
        let dir = self.plugin_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(clients) = clients {
            write(&dir.join("clients.config"), clients);
        }
        dir
    }

    pub fn register(&self, class_name: &str, app: Arc<dyn ClientApp>) {
        self.catalog.catalog.register(class_name, app);
    }

    /// Register a client app that resolves only from a classpath scope
    pub fn register_scoped(&self, class_name: &str, app: Arc<dyn ClientApp>) {
        self.catalog.register_scoped(class_name, app);
    }

    pub fn registry_text(&self) -> String {
        std::fs::read_to_string(self.config_dir.path().join("plugins.config")).unwrap_or_default()
    }
}
