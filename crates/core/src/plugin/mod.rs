//! Contract implemented by the semantic-analysis backend.
//!
//! Stratum never parses or type-checks source itself. Everything it knows
//! about symbols, bodies and types comes through [`SemanticIndex`], which is
//! synchronous and is always driven from the blocking pool.

use crate::model::{Generation, ProjectSnapshot, SyntaxNode};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratum_api::{InheritanceKind, Location, SymbolId, SymbolKind, SymbolLocator};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Malformed metadata in {}: {reason}", .path.display())]
    MalformedMetadata { path: PathBuf, reason: String },
    #[error("Index unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Other(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// A project as described by its metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub documents: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub container: Option<String>,
    pub location: Option<Location>,
}

/// One place where `caller` invokes the queried symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerSite {
    pub caller: SymbolId,
    pub location: Option<Location>,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supertype {
    pub symbol: SymbolId,
    /// `Extends` for the base class, `Implements` for every contract.
    pub kind: InheritanceKind,
}

/// Opaque compiled form of a project, owned by the index.
pub type ArtifactPayload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct CompiledArtifact {
    pub project: crate::model::ProjectKey,
    pub payload: ArtifactPayload,
}

impl std::fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl CompiledArtifact {
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

pub trait SemanticIndex: Send + Sync {
    /// Projects listed by a solution file.
    fn open_solution(&self, path: &Path) -> IndexResult<Vec<ProjectDescriptor>>;

    fn open_project(&self, path: &Path) -> IndexResult<ProjectDescriptor>;

    /// Build the compiled artifact for `project` as seen in `generation`.
    ///
    /// Expensive; callers go through the compilation cache.
    fn compile(&self, generation: &Generation, project: &ProjectSnapshot)
    -> IndexResult<ArtifactPayload>;

    /// Every type declared in the artifact's project.
    fn declared_types(&self, artifact: &CompiledArtifact) -> Vec<SymbolId>;

    fn resolve_symbol_at(
        &self,
        generation: &Generation,
        locator: &SymbolLocator,
    ) -> Option<SymbolId>;

    fn symbol_info(&self, generation: &Generation, symbol: &SymbolId) -> Option<SymbolInfo>;

    /// Body of a callable. `None` for symbols whose source is not in the workspace.
    fn body(&self, generation: &Generation, symbol: &SymbolId) -> Option<SyntaxNode>;

    fn callers(&self, generation: &Generation, symbol: &SymbolId) -> Vec<CallerSite>;

    /// Resolved immediate base type, if any.
    fn base_type(&self, generation: &Generation, ty: &SymbolId) -> Option<SymbolId>;

    /// Supertypes as written in the declaration. `None` when the type cannot be bound.
    fn declared_supertypes(&self, generation: &Generation, ty: &SymbolId)
    -> Option<Vec<Supertype>>;

    /// Contracts the type system reports for `ty`, including inherited ones.
    /// `None` when the type cannot be bound.
    fn resolved_contracts(&self, generation: &Generation, ty: &SymbolId)
    -> Option<Vec<SymbolId>>;
}
