#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use stratum_api::{GenerationId, InheritanceKind, SymbolId, SymbolKind, SymbolLocator};
use stratum_core::config::StratumConfig;
use stratum_core::model::{Generation, ProjectSnapshot, SyntaxKind, SyntaxNode};
use stratum_core::plugin::{
    ArtifactPayload, CallerSite, CompiledArtifact, IndexError, IndexResult, ProjectDescriptor,
    SemanticIndex, Supertype, SymbolInfo,
};
use stratum_core::runtime::{SyncStats, WorkspaceSynchronizer};

#[derive(Debug, Clone)]
struct TypeDef {
    kind: SymbolKind,
    project: String,
    base: Option<SymbolId>,
    /// `None` makes the type unbindable.
    declared: Option<Vec<Supertype>>,
    /// Overrides contracts computed from declarations.
    contracts: Option<Vec<SymbolId>>,
}

#[derive(Default)]
struct State {
    types: BTreeMap<SymbolId, TypeDef>,
    methods: BTreeMap<SymbolId, Option<SyntaxNode>>,
    places: HashMap<(PathBuf, usize), SymbolId>,
}

/// In-memory `SemanticIndex`.
///
/// Workspace metadata is read from disk: a solution lists one
/// `Project = relative/path` per line, a project lists one document path per
/// line relative to its directory, and a line starting with `!` makes the
/// project malformed. Symbols, bodies and types are registered by tests.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
    compile_calls: AtomicUsize,
    compiled: Mutex<Vec<(String, GenerationId, GenerationId)>>,
    open_project_calls: AtomicUsize,
    open_project_delay_ms: AtomicU64,
}

fn short_name(id: &str) -> String {
    let tail = id.rsplit(':').next().unwrap_or(id);
    tail.rsplit('.').next().unwrap_or(tail).to_string()
}

impl MemoryIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    /// `(project name, revision, config_revision)` per compile, in order.
    pub fn compiled(&self) -> Vec<(String, GenerationId, GenerationId)> {
        self.compiled.lock().expect("lock poisoned").clone()
    }

    pub fn open_project_calls(&self) -> usize {
        self.open_project_calls.load(Ordering::SeqCst)
    }

    pub fn set_open_project_delay(&self, delay: Duration) {
        self.open_project_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// A class or interface whose declaration names `base` and `interfaces`.
    pub fn class(&self, id: &str, project: &str, base: Option<&str>, interfaces: &[&str]) {
        let mut declared: Vec<Supertype> = base
            .map(|b| Supertype {
                symbol: SymbolId::from(b),
                kind: InheritanceKind::Extends,
            })
            .into_iter()
            .collect();
        declared.extend(interfaces.iter().map(|i| Supertype {
            symbol: SymbolId::from(*i),
            kind: InheritanceKind::Implements,
        }));
        self.insert_type(
            id,
            TypeDef {
                kind: SymbolKind::Class,
                project: project.to_string(),
                base: base.map(SymbolId::from),
                declared: Some(declared),
                contracts: None,
            },
        );
    }

    pub fn interface(&self, id: &str, project: &str, extends: &[&str]) {
        self.insert_type(
            id,
            TypeDef {
                kind: SymbolKind::Interface,
                project: project.to_string(),
                base: None,
                declared: Some(
                    extends
                        .iter()
                        .map(|i| Supertype {
                            symbol: SymbolId::from(*i),
                            kind: InheritanceKind::Implements,
                        })
                        .collect(),
                ),
                contracts: None,
            },
        );
    }

    /// A type whose declaration list is empty but the type system still
    /// reports `base` and `contracts`.
    pub fn resolved_only(&self, id: &str, project: &str, base: Option<&str>, contracts: &[&str]) {
        self.insert_type(
            id,
            TypeDef {
                kind: SymbolKind::Class,
                project: project.to_string(),
                base: base.map(SymbolId::from),
                declared: Some(Vec::new()),
                contracts: Some(contracts.iter().map(|c| SymbolId::from(*c)).collect()),
            },
        );
    }

    /// A type that names `supertypes` in source but the type system reports nothing for.
    pub fn declared_only(&self, id: &str, project: &str, supertypes: &[(&str, InheritanceKind)]) {
        self.insert_type(
            id,
            TypeDef {
                kind: SymbolKind::Class,
                project: project.to_string(),
                base: None,
                declared: Some(
                    supertypes
                        .iter()
                        .map(|(s, kind)| Supertype {
                            symbol: SymbolId::from(*s),
                            kind: *kind,
                        })
                        .collect(),
                ),
                contracts: Some(Vec::new()),
            },
        );
    }

    pub fn unbindable(&self, id: &str, project: &str) {
        self.insert_type(
            id,
            TypeDef {
                kind: SymbolKind::Class,
                project: project.to_string(),
                base: None,
                declared: None,
                contracts: None,
            },
        );
    }

    fn insert_type(&self, id: &str, def: TypeDef) {
        self.state
            .write()
            .expect("lock poisoned")
            .types
            .insert(SymbolId::from(id), def);
    }

    /// A method with `body`; `None` models a member without source.
    pub fn method(&self, id: &str, body: Option<SyntaxNode>) {
        self.state
            .write()
            .expect("lock poisoned")
            .methods
            .insert(SymbolId::from(id), body);
    }

    /// A method whose body invokes each of `targets` once.
    pub fn method_calling(&self, id: &str, targets: &[&str]) {
        self.method(id, Some(calls(targets)));
    }

    pub fn place(&self, path: &Path, line: usize, id: &str) {
        self.state
            .write()
            .expect("lock poisoned")
            .places
            .insert((path.to_path_buf(), line), SymbolId::from(id));
    }

    fn computed_contracts(state: &State, ty: &SymbolId) -> Option<Vec<SymbolId>> {
        let def = state.types.get(ty)?;
        if let Some(contracts) = &def.contracts {
            return Some(contracts.clone());
        }
        def.declared.as_ref()?;

        let mut out = Vec::new();
        let mut visited: HashSet<SymbolId> = HashSet::from([ty.clone()]);
        let mut queue = VecDeque::from([ty.clone()]);
        while let Some(current) = queue.pop_front() {
            let Some(current_def) = state.types.get(&current) else {
                continue;
            };
            for s in current_def.declared.iter().flatten() {
                if visited.insert(s.symbol.clone()) {
                    if s.kind == InheritanceKind::Implements {
                        out.push(s.symbol.clone());
                    }
                    queue.push_back(s.symbol.clone());
                }
            }
        }
        Some(out)
    }
}

/// Body block that invokes each target once, one per line.
pub fn calls(targets: &[&str]) -> SyntaxNode {
    SyntaxNode::new(SyntaxKind::Block).with_children(targets.iter().enumerate().map(
        |(line, target)| {
            SyntaxNode::call(SyntaxKind::Invocation, *target, format!("{}()", short_name(target)))
                .with_location(stratum_api::Location::new(
                    "/src/Calls.cs",
                    stratum_api::Range::new(line, 0, line, 10),
                ))
        },
    ))
}

impl SemanticIndex for MemoryIndex {
    fn open_solution(&self, path: &Path) -> IndexResult<Vec<ProjectDescriptor>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let dir = path.parent().unwrap_or(Path::new(""));
        content
            .lines()
            .filter_map(|line| line.trim().strip_prefix("Project = "))
            .map(|rel| self.open_project(&dir.join(rel.trim())))
            .collect()
    }

    fn open_project(&self, path: &Path) -> IndexResult<ProjectDescriptor> {
        self.open_project_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.open_project_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let dir = path.parent().unwrap_or(Path::new(""));
        let mut documents = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(reason) = line.strip_prefix('!') {
                return Err(IndexError::MalformedMetadata {
                    path: path.to_path_buf(),
                    reason: reason.trim().to_string(),
                });
            }
            documents.push(dir.join(line));
        }
        Ok(ProjectDescriptor {
            path: path.to_path_buf(),
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            documents,
        })
    }

    fn compile(
        &self,
        _generation: &Generation,
        project: &ProjectSnapshot,
    ) -> IndexResult<ArtifactPayload> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        self.compiled.lock().expect("lock poisoned").push((
            project.name.clone(),
            project.revision,
            project.config_revision,
        ));
        Ok(Arc::new(project.name.clone()))
    }

    fn declared_types(&self, artifact: &CompiledArtifact) -> Vec<SymbolId> {
        let Some(project) = artifact.downcast::<String>() else {
            return Vec::new();
        };
        let state = self.state.read().expect("lock poisoned");
        state
            .types
            .iter()
            .filter(|(_, def)| &def.project == project)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn resolve_symbol_at(
        &self,
        _generation: &Generation,
        locator: &SymbolLocator,
    ) -> Option<SymbolId> {
        let state = self.state.read().expect("lock poisoned");
        let id = state.places.get(&(locator.path.clone(), locator.line))?;
        match &locator.name {
            Some(name) if short_name(id.as_str()) != *name => None,
            _ => Some(id.clone()),
        }
    }

    fn symbol_info(&self, _generation: &Generation, symbol: &SymbolId) -> Option<SymbolInfo> {
        let state = self.state.read().expect("lock poisoned");
        let kind = if let Some(def) = state.types.get(symbol) {
            def.kind
        } else if state.methods.contains_key(symbol) {
            SymbolKind::Method
        } else {
            return None;
        };
        Some(SymbolInfo {
            id: symbol.clone(),
            name: short_name(symbol.as_str()),
            kind,
            container: None,
            location: None,
        })
    }

    fn body(&self, _generation: &Generation, symbol: &SymbolId) -> Option<SyntaxNode> {
        let state = self.state.read().expect("lock poisoned");
        state.methods.get(symbol).cloned().flatten()
    }

    fn callers(&self, _generation: &Generation, symbol: &SymbolId) -> Vec<CallerSite> {
        let state = self.state.read().expect("lock poisoned");
        let mut sites = Vec::new();
        for (caller, body) in &state.methods {
            let Some(body) = body else {
                continue;
            };
            for node in body.descendants() {
                if node.kind.is_call_form() && node.target.as_ref() == Some(symbol) {
                    sites.push(CallerSite {
                        caller: caller.clone(),
                        location: node.location.clone(),
                        expression: node.text.clone().unwrap_or_default(),
                    });
                }
            }
        }
        sites
    }

    fn base_type(&self, _generation: &Generation, ty: &SymbolId) -> Option<SymbolId> {
        let state = self.state.read().expect("lock poisoned");
        state.types.get(ty).and_then(|def| def.base.clone())
    }

    fn declared_supertypes(
        &self,
        _generation: &Generation,
        ty: &SymbolId,
    ) -> Option<Vec<Supertype>> {
        let state = self.state.read().expect("lock poisoned");
        state.types.get(ty).and_then(|def| def.declared.clone())
    }

    fn resolved_contracts(
        &self,
        _generation: &Generation,
        ty: &SymbolId,
    ) -> Option<Vec<SymbolId>> {
        let state = self.state.read().expect("lock poisoned");
        Self::computed_contracts(&state, ty)
    }
}

/// Short windows so tests observe debounced behavior quickly.
pub fn test_config() -> StratumConfig {
    let mut config = StratumConfig::default();
    config.sync.quiescence_ms = 50;
    config.sync.publish_backoff_ms = 5;
    config.sync.publish_backoff_max_ms = 20;
    config
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// A solution `App.sln` with projects `app/App.csproj` and `lib/Lib.csproj`.
pub fn two_project_workspace(root: &Path) {
    write_files(
        root,
        &[
            ("App.sln", "Project = app/App.csproj\nProject = lib/Lib.csproj\n"),
            ("app/App.csproj", "Program.cs\n"),
            ("app/Program.cs", "class Program {}"),
            ("lib/Lib.csproj", "Util.cs\n"),
            ("lib/Util.cs", "class Util {}"),
        ],
    );
}

pub async fn start(index: Arc<MemoryIndex>) -> Arc<WorkspaceSynchronizer> {
    WorkspaceSynchronizer::start(index, test_config())
}

/// Wait until a generation at or beyond `target` is published.
pub async fn wait_for_generation(sync: &WorkspaceSynchronizer, target: GenerationId) -> GenerationId {
    let mut rx = sync.subscribe();
    let observed = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|g| *g >= target))
        .await
        .expect("timed out waiting for generation")
        .expect("synchronizer shut down");
    *observed
}

/// Poll the synchronizer counters until `done` holds.
pub async fn wait_for_stats(sync: &WorkspaceSynchronizer, done: impl Fn(&SyncStats) -> bool) -> SyncStats {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = sync.stats();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for synchronizer stats")
}
