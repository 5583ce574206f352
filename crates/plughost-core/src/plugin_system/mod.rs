//! # Plughost Plugin System
//!
//! Lifecycle management for optional, independently installed plugins:
//! enabling and disabling them, launching their bundled client apps inside
//! isolated execution scopes, deferring startup, and answering whether a
//! plugin is still active.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`manager`]**: The orchestrator ([`PluginManager`], [`DefaultPluginManager`])
//!   driving start, stop and delete of one plugin or all enabled ones.
//! - **[`scheduler`]**: [`ClientAppScheduler`] runs one client app for an action,
//!   inline, on a thread of the plugin's group, or as a deferred job.
//! - **[`scope`]**: The process-wide [`ScopeCache`] of [`ExecutionScope`]s, keyed so
//!   that stop and uninstall reach the state their start created.
//! - **[`running`]**: [`RunningStateTracker`] answers liveness from threads, jobs
//!   and webapps.
//! - **[`jobs`]**: Deferred execution ([`JobQueue`], [`TokioJobQueue`]).
//! - **[`loader`]**: Class name resolution ([`ClassResolver`], [`AppCatalog`]),
//!   including native entry points found in scope libraries.
//! - **[`manifest`]**: `clients.config` and `plugin.config` parsing.
//! - **[`registry`]**: The persisted start-on-load registry ([`PluginRegistry`]).
//! - **[`host`]**: Interfaces to the webapp host, console navigation and
//!   translation catalog, with in-memory implementations.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod error;
pub mod host;
pub mod jobs;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod running;
pub mod scheduler;
pub mod scope;

pub use host::{InMemoryNavRegistry, InMemoryWebAppHost, NavRegistry, ResourceSearchPath, TranslationCatalog, WebAppHost};
pub use jobs::{JobQueue, JobState, ScheduledJob, TokioJobQueue};
pub use loader::{AppCatalog, ClassResolver, ClientApp};
pub use manager::{DefaultPluginManager, HostServices, PluginManager};
pub use manifest::{ClientAppSpec, ConsoleLink, PluginProperties};
pub use registry::{Plugin, PluginRegistry};
pub use running::{RunningState, RunningStateTracker, ThreadGroup};
pub use scheduler::{ClientAction, ClientAppScheduler, DispatchOutcome, RetryPolicy};
pub use scope::{ExecutionScope, ScopeCache, ScopeKey};
// Test module declaration
#[cfg(test)]
mod tests;
