pub mod kernel;
pub mod plugin_system;
pub mod storage;
pub mod utils;

// Re-export key public types and traits for the binary and embedders
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use plugin_system::{ClientApp, DefaultPluginManager, PluginManager};
pub use storage::StorageProvider;
