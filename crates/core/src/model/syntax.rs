use stratum_api::{Location, SymbolId};

/// Language-neutral node kinds reported by the index for method bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Block,
    If,
    While,
    DoWhile,
    For,
    ForEach,
    /// Switch statement; its case labels carry the branches.
    Switch,
    CaseLabel,
    DefaultLabel,
    /// One arm of a switch expression.
    SwitchArm,
    /// `cond ? a : b`
    Conditional,
    Catch,
    LogicalAnd,
    LogicalOr,
    AndPattern,
    OrPattern,
    Invocation,
    ObjectCreation,
    /// Property or indexer access; resolves to the accessor.
    PropertyAccess,
    /// `: base(..)` / `: this(..)`
    ConstructorInitializer,
    EventSubscribe,
    EventUnsubscribe,
    Other,
}

impl SyntaxKind {
    /// Node kinds that reach another member.
    pub fn is_call_form(self) -> bool {
        matches!(
            self,
            SyntaxKind::Invocation
                | SyntaxKind::ObjectCreation
                | SyntaxKind::PropertyAccess
                | SyntaxKind::ConstructorInitializer
                | SyntaxKind::EventSubscribe
                | SyntaxKind::EventUnsubscribe
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub location: Option<Location>,
    /// Source text of the expression, for call forms.
    pub text: Option<String>,
    /// Symbol the node binds to, when the index could resolve it.
    pub target: Option<SymbolId>,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            location: None,
            text: None,
            target: None,
            children: Vec::new(),
        }
    }

    pub fn call(kind: SyntaxKind, target: impl Into<SymbolId>, text: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            text: Some(text.into()),
            ..Self::new(kind)
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SyntaxNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Pre-order walk over this node and everything below it.
    pub fn descendants(&self) -> impl Iterator<Item = &SyntaxNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}
