use crate::models::{GenerationId, SymbolHandle};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {what}{}", .path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    NotFound {
        what: String,
        path: Option<PathBuf>,
    },
    #[error("Stale handle {handle}: current generation is {current}")]
    Stale {
        handle: SymbolHandle,
        current: GenerationId,
    },
    #[error("Unsupported path {}: {reason}", .path.display())]
    Unsupported { path: PathBuf, reason: String },
    #[error("Fatal error: {0}")]
    Fatal(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolId;

    #[test]
    fn not_found_message_includes_path() {
        let err = ApiError::NotFound {
            what: "symbol `Run`".to_string(),
            path: Some(PathBuf::from("/ws/src/A.cs")),
        };
        assert_eq!(err.to_string(), "Not found: symbol `Run` (/ws/src/A.cs)");

        let err = ApiError::NotFound {
            what: "type `Base`".to_string(),
            path: None,
        };
        assert_eq!(err.to_string(), "Not found: type `Base`");
    }

    #[test]
    fn stale_message_names_both_generations() {
        let err = ApiError::Stale {
            handle: SymbolHandle::new(GenerationId(3), SymbolId::new("T:Base")),
            current: GenerationId(5),
        };
        assert_eq!(
            err.to_string(),
            "Stale handle T:Base@3: current generation is 5"
        );
    }
}
