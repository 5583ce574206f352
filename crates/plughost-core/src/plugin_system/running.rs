use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::plugin_system::host::WebAppHost;
use crate::plugin_system::jobs::{JobQueue, ScheduledJob};

/// Groups the threads spawned for one plugin.
///
/// Each thread holds a completion guard for its whole run, so the live count
/// drops as soon as the thread body returns or unwinds.
#[derive(Debug)]
pub struct ThreadGroup {
    name: String,
    live: Arc<AtomicUsize>,
    spawned: AtomicU64,
}

struct CompletionGuard(Arc<AtomicUsize>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ThreadGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            live: Arc::new(AtomicUsize::new(0)),
            spawned: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn `f` on a new thread named `<group>:<label>`.
    pub fn spawn<F>(&self, label: &str, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.live.fetch_add(1, Ordering::AcqRel);
        let guard = CompletionGuard(self.live.clone());
        let thread_name = format!("{}:{}", self.name, label);
        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            let _guard = guard;
            f();
        });
        match spawned {
            Ok(_) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            // The closure, and with it the guard, was dropped by the failed spawn
            Err(e) => Err(e),
        }
    }

    /// Threads still running
    pub fn active_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Threads ever started in this group
    pub fn spawned_count(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

/// Everything a plugin has set running.
#[derive(Debug)]
pub struct RunningState {
    threads: Arc<ThreadGroup>,
    jobs: Mutex<Vec<Arc<ScheduledJob>>>,
    webapps: Mutex<BTreeSet<String>>,
}

impl RunningState {
    pub(crate) fn new(plugin: &str) -> Self {
        Self {
            threads: Arc::new(ThreadGroup::new(plugin)),
            jobs: Mutex::new(Vec::new()),
            webapps: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn threads(&self) -> &Arc<ThreadGroup> {
        &self.threads
    }

    pub fn add_job(&self, job: Arc<ScheduledJob>) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job);
        }
    }

    /// Jobs not yet seen finished
    pub fn jobs(&self) -> Vec<Arc<ScheduledJob>> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn add_webapp(&self, name: &str) {
        if let Ok(mut webapps) = self.webapps.lock() {
            webapps.insert(name.to_string());
        }
    }

    pub fn webapps(&self) -> Vec<String> {
        self.webapps.lock().map(|w| w.iter().cloned().collect()).unwrap_or_default()
    }

    /// Drop jobs the queue no longer considers active; true if any remain.
    fn has_active_jobs(&self, queue: &dyn JobQueue) -> bool {
        match self.jobs.lock() {
            Ok(mut jobs) => {
                jobs.retain(|job| queue.is_job_active(job));
                !jobs.is_empty()
            }
            Err(_) => false,
        }
    }
}

/// Per-plugin running state, shared by every operation in the process.
///
/// Entries are created on a plugin's first start dispatch and never removed;
/// liveness is recomputed from threads, jobs and webapps on every query.
pub struct RunningStateTracker {
    states: RwLock<HashMap<String, Arc<RunningState>>>,
    jobs: Arc<dyn JobQueue>,
    webapps: Arc<dyn WebAppHost>,
}

impl RunningStateTracker {
    pub fn new(jobs: Arc<dyn JobQueue>, webapps: Arc<dyn WebAppHost>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            jobs,
            webapps,
        }
    }

    pub fn job_queue(&self) -> &Arc<dyn JobQueue> {
        &self.jobs
    }

    /// State for `plugin`, creating it if absent. The first insert wins.
    pub fn state(&self, plugin: &str) -> Arc<RunningState> {
        if let Some(state) = self.get(plugin) {
            return state;
        }
        let mut states = match self.states.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states
            .entry(plugin.to_string())
            .or_insert_with(|| Arc::new(RunningState::new(plugin)))
            .clone()
    }

    pub fn get(&self, plugin: &str) -> Option<Arc<RunningState>> {
        self.states.read().ok()?.get(plugin).cloned()
    }

    /// True if any thread, job or webapp of `plugin` is still active.
    pub fn is_running(&self, plugin: &str) -> bool {
        let state = self.get(plugin);
        let threads = state.as_ref().map(|s| s.threads.active_count()).unwrap_or(0);
        let jobs = state.as_ref().map(|s| s.has_active_jobs(self.jobs.as_ref())).unwrap_or(false);
        let webapp = self.webapps.is_web_app_running(plugin)
            || state
                .as_ref()
                .map(|s| s.webapps().iter().any(|w| self.webapps.is_web_app_running(w)))
                .unwrap_or(false);
        log::debug!(
            "plugin {}: threads running? {}; jobs running? {}; webapp running? {}",
            plugin,
            threads > 0,
            jobs,
            webapp
        );
        threads > 0 || jobs || webapp
    }
}

impl fmt::Debug for RunningStateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins: Vec<String> = self
            .states
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("RunningStateTracker")
            .field("plugins", &plugins)
            .finish_non_exhaustive()
    }
}
