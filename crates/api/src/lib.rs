pub mod error;
pub mod lifecycle;
pub mod models;
pub mod semantic;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
pub use lifecycle::{WatchHandle, WorkspaceLifecycle};
pub use models::*;
pub use semantic::{CallGraphAnalyzer, InheritanceAnalyzer, SymbolResolver};

/// Composite trait representing the full Stratum query surface.
/// Clients that need everything depend on this single trait.
pub trait StratumEngine:
    SymbolResolver + CallGraphAnalyzer + InheritanceAnalyzer + WorkspaceLifecycle
{
}

impl<T> StratumEngine for T where
    T: SymbolResolver + CallGraphAnalyzer + InheritanceAnalyzer + WorkspaceLifecycle
{
}
