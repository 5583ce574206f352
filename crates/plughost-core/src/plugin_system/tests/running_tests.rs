use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::plugin_system::host::{InMemoryWebAppHost, WebAppHost};
use crate::plugin_system::jobs::ScheduledJob;
use crate::plugin_system::running::{RunningStateTracker, ThreadGroup};
use crate::plugin_system::tests::support::{eventually, Gate, ManualJobQueue};

fn tracker() -> (RunningStateTracker, Arc<ManualJobQueue>, Arc<InMemoryWebAppHost>) {
    let jobs = Arc::new(ManualJobQueue::new());
    let webapps = Arc::new(InMemoryWebAppHost::new());
    (RunningStateTracker::new(jobs.clone(), webapps.clone()), jobs, webapps)
}

#[test]
fn test_thread_group_counts_live_threads() {
    let group = ThreadGroup::new("foo");
    let gate = Gate::new();
    for label in ["a", "b"] {
        let gate = gate.clone();
        group.spawn(label, move || gate.wait()).unwrap();
    }
    assert_eq!(group.name(), "foo");
    assert_eq!(group.spawned_count(), 2);
    assert_eq!(group.active_count(), 2);

    gate.open();
    assert!(eventually(|| group.active_count() == 0));
    assert_eq!(group.spawned_count(), 2);
}

#[test]
fn test_thread_group_counts_down_on_panic() {
    let group = ThreadGroup::new("foo");
    group.spawn("boom", || panic!("client app failure")).unwrap();
    assert!(eventually(|| group.active_count() == 0));
}

#[test]
fn test_thread_names_carry_group() {
    let group = ThreadGroup::new("foo");
    let (tx, rx) = std::sync::mpsc::channel();
    group
        .spawn("Foo", move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        })
        .unwrap();
    assert_eq!(rx.recv().unwrap(), Some("foo:Foo".to_string()));
}

#[test]
fn test_unknown_plugin_is_not_running() {
    let (tracker, _, _) = tracker();
    assert!(tracker.get("foo").is_none());
    assert!(!tracker.is_running("foo"));
}

#[test]
fn test_state_is_created_once() {
    let (tracker, _, _) = tracker();
    let first = tracker.state("foo");
    let second = tracker.state("foo");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(first.threads(), second.threads()));
}

#[test]
fn test_running_while_thread_alive() {
    let (tracker, _, _) = tracker();
    let gate = Gate::new();
    let waiter = gate.clone();
    tracker.state("foo").threads().spawn("Foo", move || waiter.wait()).unwrap();

    assert!(tracker.is_running("foo"));
    gate.open();
    assert!(eventually(|| !tracker.is_running("foo")));
}

#[test]
fn test_running_until_job_fires() {
    let (tracker, jobs, _) = tracker();
    let job = Arc::new(ScheduledJob::new("foo", "C", "C", Duration::from_secs(5)).unwrap());
    tracker.state("foo").add_job(job.clone());
    jobs_add(&jobs, job);

    assert!(tracker.is_running("foo"));
    assert_eq!(jobs.fire_all(), 1);
    assert!(!tracker.is_running("foo"));
    // Finished jobs are pruned by the query
    assert!(tracker.state("foo").jobs().is_empty());
}

fn jobs_add(jobs: &ManualJobQueue, job: Arc<ScheduledJob>) {
    use crate::plugin_system::jobs::JobQueue;
    jobs.add_job(job, Box::new(|| {})).unwrap();
}

#[test]
fn test_running_while_webapp_deployed() {
    let (tracker, _, webapps) = tracker();

    // A webapp named after the plugin counts even without recorded state
    webapps.start_web_app("foo", Path::new("/p/foo.war")).unwrap();
    assert!(tracker.is_running("foo"));
    webapps.stop_web_app("foo");
    assert!(!tracker.is_running("foo"));

    tracker.state("foo").add_webapp("foo-admin");
    webapps.start_web_app("foo-admin", Path::new("/p/foo-admin.war")).unwrap();
    assert!(tracker.is_running("foo"));
    webapps.stop_web_app("foo-admin");
    assert!(!tracker.is_running("foo"));
    assert_eq!(tracker.state("foo").webapps(), vec!["foo-admin".to_string()]);
}
