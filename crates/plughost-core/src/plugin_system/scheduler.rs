//! Dispatch of declared client apps.
//!
//! For each client app and action the scheduler resolves arguments and the
//! execution scope, then runs the app inline, on a new thread of the plugin's
//! [`ThreadGroup`](crate::plugin_system::running::ThreadGroup), or as a
//! deferred job, depending on the action and the declared delay.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::jobs::ScheduledJob;
use crate::plugin_system::loader::{ClassResolver, ClientApp};
use crate::plugin_system::manifest::ClientAppSpec;
use crate::plugin_system::running::{RunningState, RunningStateTracker};
use crate::plugin_system::scope::{ExecutionScope, ScopeCache, ScopeKey};
use crate::storage::HostConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Start,
    Stop,
    Uninstall,
}

impl fmt::Display for ClientAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientAction::Start => write!(f, "start"),
            ClientAction::Stop => write!(f, "stop"),
            ClientAction::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// What a single dispatch did
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Disabled entry, or no arguments for this action
    Skipped,
    /// Ran to completion on the calling thread
    RanInline,
    /// Started on a new thread of the plugin's group
    Spawned,
    /// Deferred until the job fires
    Scheduled(Arc<ScheduledJob>),
}

/// How often, and how long apart, a delayed client app is checked for loadability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total checks, including the first
    pub attempts: u32,
    /// Wait when the declared delay is one second or less
    pub short_interval: Duration,
    /// Wait when the declared delay is longer
    pub long_interval: Duration,
}

impl RetryPolicy {
    pub fn interval_for(&self, delay_seconds: i64) -> Duration {
        if delay_seconds > 1 {
            self.long_interval
        } else {
            self.short_interval
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            short_interval: Duration::from_millis(constants::DEFAULT_RETRY_SHORT_MILLIS),
            long_interval: Duration::from_millis(constants::DEFAULT_RETRY_LONG_MILLIS),
        }
    }
}

/// Split an argument string on whitespace. Single or double quotes group
/// words and are removed.
pub fn parse_args(args: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in args.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    result.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        result.push(current);
    }
    result
}

/// Paths substituted for `$BASE`, `$CONFIG` and `$PLUGIN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub base_dir: PathBuf,
    pub config_dir: PathBuf,
    pub plugin_dir: PathBuf,
}

impl Placeholders {
    pub fn substitute(&self, value: &str) -> String {
        if !value.contains('$') {
            return value.to_string();
        }
        value
            .replace(constants::BASE_PLACEHOLDER, &self.base_dir.to_string_lossy())
            .replace(constants::CONFIG_PLACEHOLDER, &self.config_dir.to_string_lossy())
            .replace(constants::PLUGIN_PLACEHOLDER, &self.plugin_dir.to_string_lossy())
    }
}

/// Runs client apps according to their action and delay.
pub struct ClientAppScheduler {
    base_dir: PathBuf,
    config_dir: PathBuf,
    scopes: Arc<ScopeCache>,
    running: Arc<RunningStateTracker>,
    resolver: Arc<dyn ClassResolver>,
    retry: RetryPolicy,
}

impl ClientAppScheduler {
    pub fn new(
        config: &HostConfig,
        scopes: Arc<ScopeCache>,
        running: Arc<RunningStateTracker>,
        resolver: Arc<dyn ClassResolver>,
    ) -> Self {
        Self {
            base_dir: crate::utils::fs::absolute(&config.base_dir),
            config_dir: crate::utils::fs::absolute(&config.config_dir),
            scopes,
            running,
            resolver,
            retry: RetryPolicy {
                short_interval: config.retry_short,
                long_interval: config.retry_long,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn scopes(&self) -> &Arc<ScopeCache> {
        &self.scopes
    }

    pub fn running(&self) -> &Arc<RunningStateTracker> {
        &self.running
    }

    fn placeholders(&self, plugin_dir: &Path) -> Placeholders {
        Placeholders {
            base_dir: self.base_dir.clone(),
            config_dir: self.config_dir.clone(),
            plugin_dir: crate::utils::fs::absolute(plugin_dir),
        }
    }

    /// Dispatch every entry in declaration order. The first fault stops the batch.
    pub async fn dispatch_all(&self, plugin_dir: &Path, apps: &[ClientAppSpec], action: ClientAction) -> Result<()> {
        for app in apps {
            self.dispatch(plugin_dir, app, action).await?;
        }
        Ok(())
    }

    /// Dispatch one client app for `action`.
    pub async fn dispatch(&self, plugin_dir: &Path, app: &ClientAppSpec, action: ClientAction) -> Result<DispatchOutcome> {
        let plugin = plugin_name(plugin_dir);

        let raw_args = match action {
            ClientAction::Start if app.disabled => return Ok(DispatchOutcome::Skipped),
            ClientAction::Start => app.start_args.as_str(),
            ClientAction::Stop => app.stop_args.as_deref().unwrap_or_default(),
            ClientAction::Uninstall => app.uninstall_args.as_deref().unwrap_or_default(),
        };
        if action != ClientAction::Start && raw_args.trim().is_empty() {
            return Ok(DispatchOutcome::Skipped);
        }

        let placeholders = self.placeholders(plugin_dir);
        let args: Vec<String> = parse_args(raw_args)
            .iter()
            .map(|a| placeholders.substitute(a))
            .collect();

        let scope = self.resolve_scope(&plugin, app, action, &placeholders);
        let state = match action {
            ClientAction::Start => self.running.state(&plugin),
            // Stop and uninstall never create tracked state
            ClientAction::Stop | ClientAction::Uninstall => self
                .running
                .get(&plugin)
                .unwrap_or_else(|| Arc::new(RunningState::new(&plugin))),
        };

        log::debug!("{} client {} of plugin {} with {:?}", action, app.display_name, plugin, args);

        if action == ClientAction::Start && app.delay_seconds < 0 {
            let client = self.resolve(&plugin, &app.class_name, scope.as_deref())?;
            run_client(&plugin, app, client.as_ref(), &args)?;
            Ok(DispatchOutcome::RanInline)
        } else if action != ClientAction::Start || app.delay_seconds == 0 {
            let client = self.resolve(&plugin, &app.class_name, scope.as_deref())?;
            spawn_client(&plugin, app, client, args, &state)?;
            Ok(DispatchOutcome::Spawned)
        } else {
            self.schedule(&plugin, app, args, scope, state).await
        }
    }

    /// Scope for this dispatch. Start builds and caches on a miss; stop and
    /// uninstall reuse the cached scope or build an uncached one.
    fn resolve_scope(
        &self,
        plugin: &str,
        app: &ClientAppSpec,
        action: ClientAction,
        placeholders: &Placeholders,
    ) -> Option<Arc<ExecutionScope>> {
        let classpath = placeholders.substitute(app.classpath.as_deref()?);
        let key = ScopeKey::new(plugin, &app.class_name, &app.start_args);
        match action {
            ClientAction::Start => self.scopes.get_or_create(&key, &classpath, &app.display_name),
            ClientAction::Stop | ClientAction::Uninstall => self.scopes.get(&key).or_else(|| {
                log::info!("No cached scope for {} of plugin {}, building a fresh one", app.display_name, plugin);
                self.scopes.transient(&key, &classpath, &app.display_name)
            }),
        }
    }

    fn resolve(&self, plugin: &str, class_name: &str, scope: Option<&ExecutionScope>) -> Result<Arc<dyn ClientApp>> {
        self.resolver.resolve(class_name, scope).map_err(|e| match e {
            // Attribute scope-less failures to the plugin being dispatched
            PluginSystemError::NotLoadable { reason, .. } => PluginSystemError::not_loadable(plugin, class_name, reason).into(),
            other => other.into(),
        })
    }

    /// Check loadability now, once more after a short wait, then queue a job.
    async fn schedule(
        &self,
        plugin: &str,
        app: &ClientAppSpec,
        args: Vec<String>,
        scope: Option<Arc<ExecutionScope>>,
        state: Arc<RunningState>,
    ) -> Result<DispatchOutcome> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.resolve(plugin, &app.class_name, scope.as_deref()) {
                Ok(_) => break,
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let wait = self.retry.interval_for(app.delay_seconds);
                    log::debug!("{}; checking again in {:?}", e, wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }

        let delay = Duration::from_secs(app.delay_seconds.unsigned_abs());
        let job = Arc::new(ScheduledJob::new(plugin, &app.class_name, &app.display_name, delay)?);

        let resolver = self.resolver.clone();
        let plugin_name = plugin.to_string();
        let spec = app.clone();
        let group_state = state.clone();
        let work = Box::new(move || {
            match resolver.resolve(&spec.class_name, scope.as_deref()) {
                Ok(client) => {
                    if let Err(e) = spawn_client(&plugin_name, &spec, client, args, &group_state) {
                        log::error!("{}", e);
                    }
                }
                Err(e) => log::error!("Delayed client {} of plugin {} did not start: {}", spec.display_name, plugin_name, e),
            }
        });

        state.add_job(job.clone());
        self.running.job_queue().add_job(job.clone(), work)?;
        log::info!(
            "Client {} of plugin {} will start in {}s",
            app.display_name,
            plugin,
            app.delay_seconds
        );
        Ok(DispatchOutcome::Scheduled(job))
    }
}

impl fmt::Debug for ClientAppScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAppScheduler")
            .field("base_dir", &self.base_dir)
            .field("config_dir", &self.config_dir)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn plugin_name(plugin_dir: &Path) -> String {
    crate::utils::fs::file_name(plugin_dir).unwrap_or_default()
}

/// Run inline; faults and panics become `ClientAppFailed`.
fn run_client(plugin: &str, app: &ClientAppSpec, client: &dyn ClientApp, args: &[String]) -> Result<()> {
    let failed = |message: String| PluginSystemError::ClientAppFailed {
        plugin: plugin.to_string(),
        class_name: app.class_name.clone(),
        message,
    };
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| client.run(args))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(failed(e.to_string()).into()),
        Err(panic) => Err(failed(panic_message(panic.as_ref())).into()),
    }
}

fn spawn_client(
    plugin: &str,
    app: &ClientAppSpec,
    client: Arc<dyn ClientApp>,
    args: Vec<String>,
    state: &RunningState,
) -> Result<()> {
    let plugin_name = plugin.to_string();
    let spec = app.clone();
    state
        .threads()
        .spawn(&app.display_name, move || {
            log::info!("Client {} of plugin {} running", spec.display_name, plugin_name);
            if let Err(e) = run_client(&plugin_name, &spec, client.as_ref(), &args) {
                log::error!("{}", e);
            }
        })
        .map_err(|e| {
            PluginSystemError::SchedulingError {
                plugin: plugin.to_string(),
                message: format!("cannot start a thread for {}: {}", app.display_name, e),
            }
            .into()
        })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
