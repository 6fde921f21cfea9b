pub mod cache;
pub mod config;
pub mod error;
pub mod logging;

pub mod facade;
pub mod features;
pub mod model;
pub mod plugin;
pub mod runtime;

pub use config::StratumConfig;
pub use error::{Result, StratumError};
pub use facade::EngineHandle;
pub use runtime::{ChangeClassifier, SyncStats, SyncWatchHandle, WorkspaceSynchronizer};
