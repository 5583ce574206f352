//! Resolution of client app entry points.
//!
//! A [`ClassResolver`] turns a declared class name into something runnable.
//! The default [`AppCatalog`] first looks at apps built into the host (the
//! global context) and then, when an [`ExecutionScope`] is supplied, at the
//! native libraries on that scope's classpath.
use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int};
use std::sync::{Arc, RwLock};

use libloading::Library;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::scope::ExecutionScope;

/// A runnable client app.
pub trait ClientApp: Send + Sync {
    /// Run the app with already-substituted arguments. Blocks until the app returns.
    fn run(&self, args: &[String]) -> Result<()>;
}

impl<F> ClientApp for F
where
    F: Fn(&[String]) -> Result<()> + Send + Sync,
{
    fn run(&self, args: &[String]) -> Result<()> {
        self(args)
    }
}

/// Resolves class names to runnable apps.
pub trait ClassResolver: Send + Sync + fmt::Debug {
    /// Resolve `class_name`, looking in `scope` when one is given.
    fn resolve(
        &self,
        class_name: &str,
        scope: Option<&ExecutionScope>,
    ) -> std::result::Result<Arc<dyn ClientApp>, PluginSystemError>;
}

/// C entry point exported by a native client app: `argv` holds `argc` NUL-terminated strings.
pub type NativeEntryFn = unsafe extern "C" fn(argc: c_int, argv: *const *const c_char) -> c_int;

/// Exported symbol for `class_name`: every character outside `[A-Za-z0-9_]`
/// becomes `_`, followed by `_main`. `com.example.Foo` -> `com_example_Foo_main`.
pub fn native_symbol_name(class_name: &str) -> String {
    let mut symbol: String = class_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    symbol.push_str("_main");
    symbol
}

/// Client app backed by a function exported from a scope library
struct NativeClientApp {
    class_name: String,
    entry: NativeEntryFn,
    // Keeps `entry` valid
    _library: Arc<Library>,
}

impl ClientApp for NativeClientApp {
    fn run(&self, args: &[String]) -> Result<()> {
        let c_args = args
            .iter()
            .map(|a| CString::new(a.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Other(format!("argument for {} contains NUL: {}", self.class_name, e)))?;
        let argv: Vec<*const c_char> = c_args.iter().map(|a| a.as_ptr()).collect();

        // SAFETY: argv points at `c_args`, which outlives the call, and the
        // library holding `entry` is kept alive by `_library`.
        let code = unsafe { (self.entry)(argv.len() as c_int, argv.as_ptr()) };
        if code == 0 {
            Ok(())
        } else {
            Err(Error::Other(format!("{} exited with status {}", self.class_name, code)))
        }
    }
}

fn find_native(class_name: &str, scope: &ExecutionScope) -> Option<Arc<dyn ClientApp>> {
    let symbol = native_symbol_name(class_name);
    scope.with_libraries(|libraries| {
        for loaded in libraries {
            // SAFETY: the symbol is declared with the NativeEntryFn signature by contract.
            let entry = unsafe { loaded.library.get::<NativeEntryFn>(symbol.as_bytes()) };
            if let Ok(entry) = entry {
                log::debug!("Resolved {} in {}", symbol, loaded.path.display());
                let app: Arc<dyn ClientApp> = Arc::new(NativeClientApp {
                    class_name: class_name.to_string(),
                    entry: *entry,
                    _library: loaded.library.clone(),
                });
                return Some(app);
            }
        }
        None
    })
}

/// Default resolver: built-in apps first, then the scope's native libraries.
#[derive(Default)]
pub struct AppCatalog {
    builtin: RwLock<HashMap<String, Arc<dyn ClientApp>>>,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `app` resolvable under `class_name` from every scope.
    pub fn register(&self, class_name: &str, app: Arc<dyn ClientApp>) {
        if let Ok(mut builtin) = self.builtin.write() {
            builtin.insert(class_name.to_string(), app);
        }
    }

    pub fn unregister(&self, class_name: &str) -> bool {
        self.builtin
            .write()
            .map(|mut builtin| builtin.remove(class_name).is_some())
            .unwrap_or(false)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.builtin
            .read()
            .map(|builtin| builtin.contains_key(class_name))
            .unwrap_or(false)
    }
}

impl fmt::Debug for AppCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .builtin
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("AppCatalog").field("builtin", &names).finish()
    }
}

impl ClassResolver for AppCatalog {
    fn resolve(
        &self,
        class_name: &str,
        scope: Option<&ExecutionScope>,
    ) -> std::result::Result<Arc<dyn ClientApp>, PluginSystemError> {
        if let Some(app) = self.builtin.read().ok().and_then(|b| b.get(class_name).cloned()) {
            return Ok(app);
        }
        if let Some(scope) = scope {
            if let Some(app) = find_native(class_name, scope) {
                return Ok(app);
            }
        }
        let plugin = scope.map(|s| s.key().plugin.as_str()).unwrap_or("<host>");
        Err(PluginSystemError::not_loadable(
            plugin,
            class_name,
            match scope {
                Some(s) => format!("not found in host or in {} scope entries", s.entries().len()),
                None => "not found in host".to_string(),
            },
        ))
    }
}
