// Addon Merger - merge many addon directory trees into one output tree
//
// This is the library crate containing the merge engine and its data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use events::{EventBus, MergeEvent};
pub use models::{IgnoreList, MergeOptions, MergeSettings, OutputLayout, RunReport};
pub use services::{MergeCoordinator, MergeError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
