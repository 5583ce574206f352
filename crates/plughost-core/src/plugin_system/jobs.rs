use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tokio::runtime::Handle;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;

/// Work a job runs when it fires
pub type JobWork = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for its fire time
    Pending,
    Running,
    Finished,
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// A client app start deferred until `fire_time`.
pub struct ScheduledJob {
    id: u64,
    plugin: String,
    class_name: String,
    display_name: String,
    delay: Duration,
    fire_time: SystemTime,
    fire_instant: Instant,
    state: AtomicU8,
}

impl ScheduledJob {
    /// Job firing `delay` from now. Fails when the fire time is not representable.
    pub fn new(plugin: &str, class_name: &str, display_name: &str, delay: Duration) -> Result<Self> {
        let unrepresentable = || PluginSystemError::SchedulingError {
            plugin: plugin.to_string(),
            message: format!("delay of {:?} for {} is out of range", delay, display_name),
        };
        let fire_time = SystemTime::now().checked_add(delay).ok_or_else(unrepresentable)?;
        let fire_instant = Instant::now().checked_add(delay).ok_or_else(unrepresentable)?;
        Ok(Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            plugin: plugin.to_string(),
            class_name: class_name.to_string(),
            display_name: display_name.to_string(),
            delay,
            fire_time,
            fire_instant,
            state: AtomicU8::new(JobState::Pending as u8),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wall-clock fire time
    pub fn fire_time(&self) -> SystemTime {
        self.fire_time
    }

    pub fn fire_instant(&self) -> Instant {
        self.fire_instant
    }

    pub fn state(&self) -> JobState {
        match self.state.load(Ordering::Acquire) {
            0 => JobState::Pending,
            1 => JobState::Running,
            _ => JobState::Finished,
        }
    }

    pub fn set_state(&self, state: JobState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("class_name", &self.class_name)
            .field("delay", &self.delay)
            .field("state", &self.state())
            .finish()
    }
}

/// The host's deferred-execution facility.
///
/// Jobs cannot be cancelled: once added, a job fires at its fire time.
pub trait JobQueue: Send + Sync + fmt::Debug {
    /// Run `work` once `job`'s fire time is reached.
    fn add_job(&self, job: std::sync::Arc<ScheduledJob>, work: JobWork) -> Result<()>;

    /// Whether `job` is still queued or running.
    fn is_job_active(&self, job: &ScheduledJob) -> bool;
}

/// Job queue running each job as a Tokio task that sleeps until its fire time.
#[derive(Debug, Clone)]
pub struct TokioJobQueue {
    handle: Handle,
}

impl TokioJobQueue {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Queue bound to the runtime the caller is running on
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Other(format!("job queue needs a Tokio runtime: {}", e)))
    }
}

impl JobQueue for TokioJobQueue {
    fn add_job(&self, job: std::sync::Arc<ScheduledJob>, work: JobWork) -> Result<()> {
        log::debug!("Queued {:?}", job);
        self.handle.spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(job.fire_instant())).await;
            job.set_state(JobState::Running);
            log::info!("Firing delayed client {} of plugin {}", job.display_name(), job.plugin());
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(work)).is_err() {
                log::error!("Delayed client {} of plugin {} panicked", job.display_name(), job.plugin());
            }
            job.set_state(JobState::Finished);
        });
        Ok(())
    }

    fn is_job_active(&self, job: &ScheduledJob) -> bool {
        job.state() != JobState::Finished
    }
}
