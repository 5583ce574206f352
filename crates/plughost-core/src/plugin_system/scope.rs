//! Isolated execution scopes for client apps.
//!
//! A scope is the set of library paths a client app's code is resolved from,
//! together with the libraries opened so far. Scopes are cached per
//! [`ScopeKey`] so that the stop and uninstall actions of a client app resolve
//! against the very libraries (and their static state) its start action used.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use libloading::Library;

use crate::plugin_system::error::PluginSystemError;

/// Identity of a client app across its lifecycle.
///
/// Always built from the start arguments, even for stop and uninstall.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub plugin: String,
    pub class_name: String,
    pub start_args: String,
}

impl ScopeKey {
    pub fn new(plugin: &str, class_name: &str, start_args: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            class_name: class_name.to_string(),
            start_args: start_args.to_string(),
        }
    }
}

/// A library opened inside a scope
pub(crate) struct LoadedLibrary {
    pub(crate) path: PathBuf,
    pub(crate) library: Arc<Library>,
}

/// Isolated loading context built from absolute classpath entries.
///
/// Libraries are opened on first resolution and kept for the scope's lifetime.
pub struct ExecutionScope {
    id: u64,
    key: ScopeKey,
    entries: Vec<PathBuf>,
    libraries: Mutex<Option<Vec<LoadedLibrary>>>,
}

impl ExecutionScope {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    /// Absolute classpath entries, in declaration order
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Run `f` over the scope's libraries, opening them on first use.
    ///
    /// A directory entry contributes every shared library directly inside it.
    /// Entries that fail to open are logged and skipped.
    pub(crate) fn with_libraries<R>(&self, f: impl FnOnce(&[LoadedLibrary]) -> R) -> R {
        let mut guard = match self.libraries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let libraries = guard.get_or_insert_with(|| self.open_libraries());
        f(libraries)
    }

    fn open_libraries(&self) -> Vec<LoadedLibrary> {
        let mut opened = Vec::new();
        for entry in &self.entries {
            let candidates = if entry.is_dir() {
                crate::utils::fs::files_with_extensions(entry, &[std::env::consts::DLL_EXTENSION])
                    .unwrap_or_default()
            } else {
                vec![entry.clone()]
            };
            for path in candidates {
                // SAFETY: loading a library runs its initializers; classpath entries
                // come from an installed plugin's own manifest.
                match unsafe { Library::new(&path) } {
                    Ok(library) => {
                        log::debug!("Scope {} opened library {}", self.id, path.display());
                        opened.push(LoadedLibrary {
                            path,
                            library: Arc::new(library),
                        });
                    }
                    Err(e) => log::warn!("Scope {} cannot open {}: {}", self.id, path.display(), e),
                }
            }
        }
        opened
    }
}

impl fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

/// Split a comma-separated classpath, keeping absolute entries only.
///
/// Relative entries are reported individually and left out.
pub fn parse_classpath(classpath: &str, client_name: &str) -> (Vec<PathBuf>, Vec<PluginSystemError>) {
    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    for elem in classpath.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let path = Path::new(elem);
        if path.is_absolute() {
            entries.push(path.to_path_buf());
        } else {
            rejected.push(PluginSystemError::InvalidArgument {
                client: client_name.to_string(),
                message: format!("classpath element is not absolute: {}", elem),
            });
        }
    }
    (entries, rejected)
}

/// Process-wide cache of execution scopes, one per [`ScopeKey`].
#[derive(Debug, Default)]
pub struct ScopeCache {
    scopes: Mutex<HashMap<ScopeKey, Arc<ExecutionScope>>>,
    next_id: AtomicU64,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScopeKey, Arc<ExecutionScope>>> {
        match self.scopes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cached scope for `key`, never creating one
    pub fn get(&self, key: &ScopeKey) -> Option<Arc<ExecutionScope>> {
        self.lock().get(key).cloned()
    }

    /// Cached scope for `key`, building it from `classpath` on a miss.
    ///
    /// Returns `None` when no classpath entry is usable; the caller then runs
    /// in the default context. The check and the insert happen under one lock,
    /// so concurrent callers with the same key share a single scope.
    pub fn get_or_create(&self, key: &ScopeKey, classpath: &str, client_name: &str) -> Option<Arc<ExecutionScope>> {
        let mut scopes = self.lock();
        if let Some(scope) = scopes.get(key) {
            return Some(scope.clone());
        }
        let scope = Arc::new(self.build(key, classpath, client_name)?);
        scopes.insert(key.clone(), scope.clone());
        Some(scope)
    }

    /// A fresh scope for `key` that is never added to the cache.
    ///
    /// Used when a stop or uninstall action finds no scope left by a start.
    pub fn transient(&self, key: &ScopeKey, classpath: &str, client_name: &str) -> Option<Arc<ExecutionScope>> {
        self.build(key, classpath, client_name).map(Arc::new)
    }

    fn build(&self, key: &ScopeKey, classpath: &str, client_name: &str) -> Option<ExecutionScope> {
        let (entries, rejected) = parse_classpath(classpath, client_name);
        for e in rejected {
            log::error!("Plugin {}: {}", key.plugin, e);
        }
        if entries.is_empty() {
            return None;
        }
        for entry in &entries {
            log::info!("Adding {} to the scope of client {}", entry.display(), client_name);
        }
        Some(ExecutionScope {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            key: key.clone(),
            entries,
            libraries: Mutex::new(None),
        })
    }

    /// Drop every scope belonging to `plugin`. Returns how many were dropped.
    pub fn invalidate_plugin(&self, plugin: &str) -> usize {
        let mut scopes = self.lock();
        let before = scopes.len();
        scopes.retain(|key, _| key.plugin != plugin);
        before - scopes.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
