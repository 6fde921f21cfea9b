pub mod change;
pub mod generation;
pub mod syntax;

pub use change::{ChangeKind, PendingChangeBatch};
pub use generation::{
    Candidate, ChangeSummary, DocumentSnapshot, Generation, GenerationDraft, ProjectId,
    ProjectKey, ProjectSnapshot, WorkspaceSource,
};
pub use syntax::{SyntaxKind, SyntaxNode};
