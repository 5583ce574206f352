use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::jobs::{JobQueue, JobState, ScheduledJob, TokioJobQueue};

#[test]
fn test_scheduled_job_fields() {
    let job = ScheduledJob::new("foo", "com.example.Foo", "Foo", Duration::from_secs(5)).unwrap();
    assert_eq!(job.plugin(), "foo");
    assert_eq!(job.class_name(), "com.example.Foo");
    assert_eq!(job.display_name(), "Foo");
    assert_eq!(job.delay(), Duration::from_secs(5));
    assert_eq!(job.state(), JobState::Pending);
    assert!(job.fire_time() > std::time::SystemTime::now());

    let other = ScheduledJob::new("foo", "com.example.Foo", "Foo", Duration::ZERO).unwrap();
    assert_ne!(job.id(), other.id());
}

#[test]
fn test_unrepresentable_fire_time_is_an_error() {
    let err = ScheduledJob::new("foo", "C", "C", Duration::MAX).unwrap_err();
    assert!(matches!(
        err.as_plugin_error(),
        Some(PluginSystemError::SchedulingError { plugin, .. }) if plugin == "foo"
    ));
}

#[test]
fn test_current_requires_runtime() {
    assert!(TokioJobQueue::current().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_job_fires_at_its_time() {
    let queue = TokioJobQueue::current().unwrap();
    let job = Arc::new(ScheduledJob::new("foo", "C", "C", Duration::from_secs(5)).unwrap());
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();

    queue
        .add_job(job.clone(), Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!fired.load(Ordering::SeqCst));
    assert!(queue.is_job_active(&job));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(job.state(), JobState::Finished);
    assert!(!queue.is_job_active(&job));
}

fn boom() {
    panic!("boom");
}

#[tokio::test(start_paused = true)]
async fn test_panicking_job_still_finishes() {
    let queue = TokioJobQueue::current().unwrap();
    let job = Arc::new(ScheduledJob::new("foo", "C", "C", Duration::from_secs(1)).unwrap());
    queue.add_job(job.clone(), Box::new(boom)).unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(job.state(), JobState::Finished);
}
