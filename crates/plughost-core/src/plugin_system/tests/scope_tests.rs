use std::path::PathBuf;
use std::sync::{Arc, Barrier};

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::scope::{parse_classpath, ScopeCache, ScopeKey};

fn key(plugin: &str) -> ScopeKey {
    ScopeKey::new(plugin, "com.example.Foo", "-x 1")
}

#[test]
fn test_parse_classpath_rejects_relative_entries() {
    let (entries, rejected) = parse_classpath("/opt/a.so, lib/b.so ,,/opt/c", "Foo");
    assert_eq!(entries, vec![PathBuf::from("/opt/a.so"), PathBuf::from("/opt/c")]);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        &rejected[0],
        PluginSystemError::InvalidArgument { client, message } if client == "Foo" && message.contains("lib/b.so")
    ));
}

#[test]
fn test_get_never_creates() {
    let cache = ScopeCache::new();
    assert!(cache.get(&key("foo")).is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_transient_scope_is_not_cached() {
    let cache = ScopeCache::new();
    let scope = cache.transient(&key("foo"), "/opt/foo/lib,relative", "Foo").expect("scope");
    assert_eq!(scope.entries(), &[PathBuf::from("/opt/foo/lib")]);
    assert!(cache.is_empty());
    assert!(cache.transient(&key("foo"), "relative", "Foo").is_none());

    let cached = cache.get_or_create(&key("foo"), "/opt/foo/lib", "Foo").expect("scope");
    assert!(!Arc::ptr_eq(&cached, &scope));
}

#[test]
fn test_get_or_create_reuses_scope() {
    let cache = ScopeCache::new();
    let first = cache.get_or_create(&key("foo"), "/opt/foo/lib", "Foo").expect("scope");
    // A different classpath on a hit is ignored: the scope is never rebuilt
    let second = cache.get_or_create(&key("foo"), "/elsewhere", "Foo").expect("scope");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.entries(), &[PathBuf::from("/opt/foo/lib")]);
    assert_eq!(cache.len(), 1);
    assert!(Arc::ptr_eq(&cache.get(&key("foo")).unwrap(), &first));
}

#[test]
fn test_no_usable_entries_creates_nothing() {
    let cache = ScopeCache::new();
    assert!(cache.get_or_create(&key("foo"), "relative/only.so", "Foo").is_none());
    assert!(cache.get_or_create(&key("foo"), "", "Foo").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_key_includes_start_args() {
    let cache = ScopeCache::new();
    let a = cache.get_or_create(&ScopeKey::new("foo", "C", "a"), "/x", "C").unwrap();
    let b = cache.get_or_create(&ScopeKey::new("foo", "C", "b"), "/x", "C").unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_concurrent_creation_converges_on_one_scope() {
    let cache = Arc::new(ScopeCache::new());
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                cache.get_or_create(&key("foo"), "/opt/foo/lib", "Foo").unwrap().id()
            })
        })
        .collect();
    let ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_invalidate_plugin() {
    let cache = ScopeCache::new();
    cache.get_or_create(&key("foo"), "/a", "Foo").unwrap();
    cache.get_or_create(&ScopeKey::new("foo", "Other", ""), "/b", "Other").unwrap();
    let kept = cache.get_or_create(&key("foobar"), "/c", "Foo").unwrap();

    assert_eq!(cache.invalidate_plugin("foo"), 2);
    assert!(cache.get(&key("foo")).is_none());
    assert!(Arc::ptr_eq(&cache.get(&key("foobar")).unwrap(), &kept));

    let fresh = cache.get_or_create(&key("foo"), "/a", "Foo").unwrap();
    assert_ne!(fresh.id(), kept.id());
}
