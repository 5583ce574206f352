//! # Plughost Core Kernel
//!
//! The `kernel` module wires the plugin host together.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application) builds the
//!   storage provider, host settings and default host services, registers the
//!   plugin manager and drives it through initialize, start and shutdown.
//! - **Component Lifecycle**: The [`KernelComponent`](component::KernelComponent) trait
//!   and the [`DependencyRegistry`](component::DependencyRegistry) holding components
//!   by concrete type.
//! - **Core Constants**: File names, setting keys and defaults in `constants`.
//! - **Error Handling**: The crate-wide [`Error`](error::Error) and `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::{DependencyRegistry, KernelComponent};
pub use error::{Error, Result};
