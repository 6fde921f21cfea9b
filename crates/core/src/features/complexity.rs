use crate::model::{SyntaxKind, SyntaxNode};

/// McCabe complexity of a body: one plus the number of decision points.
///
/// Each case label and switch-expression arm is a decision point; `default`
/// labels and the switch node itself are not. A missing body scores 1.
pub fn cyclomatic_complexity(body: Option<&SyntaxNode>) -> usize {
    let Some(body) = body else {
        return 1;
    };
    1 + body
        .descendants()
        .filter(|node| is_decision_point(node.kind))
        .count()
}

fn is_decision_point(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::If
            | SyntaxKind::While
            | SyntaxKind::DoWhile
            | SyntaxKind::For
            | SyntaxKind::ForEach
            | SyntaxKind::CaseLabel
            | SyntaxKind::SwitchArm
            | SyntaxKind::Conditional
            | SyntaxKind::Catch
            | SyntaxKind::LogicalAnd
            | SyntaxKind::LogicalOr
            | SyntaxKind::AndPattern
            | SyntaxKind::OrPattern
    )
}
