#![forbid(unsafe_code)]

//! Lexical live ranges: from a binding's definition to its last mention.
//!
//! Ranges are computed per function and only reported; borrow checking keeps
//! clearing borrows at control-flow joins regardless of what they say.

use serde::Serialize;
use veritas_ast::{Block, Expr, ExprKind, FunctionDef, Pattern, Position, Span, Stmt, walk_block};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LiveRange {
    pub name: String,
    pub defined: Span,
    /// The definition itself when the binding is never mentioned.
    pub last_use: Span,
}

impl LiveRange {
    fn start(&self) -> Position {
        self.defined.start
    }

    fn end(&self) -> Position {
        if self.last_use.precedes(&self.defined) {
            self.defined.end
        } else {
            self.last_use.end
        }
    }

    pub fn is_used(&self) -> bool {
        self.last_use != self.defined
    }

    /// Do the two ranges share at least one source position?
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        let key = |p: Position| (p.line, p.column);
        key(self.start()) <= key(other.end()) && key(other.start()) <= key(self.end())
    }

    pub fn contains(&self, span: &Span) -> bool {
        let key = |p: Position| (p.line, p.column);
        key(self.start()) <= key(span.start) && key(span.end) <= key(self.end())
    }
}

#[derive(Debug, Default)]
pub struct LifetimeAnalyzer {
    ranges: Vec<LiveRange>,
}

impl LifetimeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live ranges of every parameter and local binding of `def`, in
    /// definition order.
    pub fn analyze(mut self, def: &FunctionDef) -> Vec<LiveRange> {
        for param in &def.params {
            self.define(&param.name.node, &param.name.span);
        }
        let Some(body) = &def.body else {
            return self.ranges;
        };

        let mut definitions = Vec::new();
        block_lets(body, &mut definitions);
        walk_block(body, &mut |expr: &Expr| definitions.extend(nested_bindings(expr)));
        for (name, span) in definitions {
            self.define(&name, &span);
        }
        self.ranges.sort_by(|a, b| {
            let key = |r: &LiveRange| (r.defined.start.line, r.defined.start.column);
            key(a).cmp(&key(b))
        });

        let mut mentions = Vec::new();
        walk_block(body, &mut |expr: &Expr| {
            if let Some(name) = expr.as_ident() {
                mentions.push((name.to_string(), expr.span.clone()));
            }
        });
        for (name, span) in mentions {
            self.mention(&name, &span);
        }
        self.ranges
    }

    fn define(&mut self, name: &str, span: &Span) {
        self.ranges.push(LiveRange {
            name: name.to_string(),
            defined: span.clone(),
            last_use: span.clone(),
        });
    }

    /// Attribute a mention to the latest same-named definition preceding it.
    fn mention(&mut self, name: &str, span: &Span) {
        let target = self
            .ranges
            .iter_mut()
            .rev()
            .find(|r| r.name == name && r.defined.precedes(span));
        if let Some(range) = target {
            if range.last_use.precedes(span) {
                range.last_use = span.clone();
            }
        }
    }
}

/// Bindings introduced directly by `expr`: `let`s of its own blocks, `for`
/// and match-arm patterns, lambda parameters.
fn nested_bindings(expr: &Expr) -> Vec<(String, Span)> {
    let mut out = Vec::new();
    match &expr.kind {
        ExprKind::Block(b) | ExprKind::Loop { body: b } | ExprKind::While { body: b, .. } => {
            block_lets(b, &mut out)
        }
        ExprKind::If { then_branch, .. } => block_lets(then_branch, &mut out),
        ExprKind::For { pattern, body, .. } => {
            pattern_names(pattern, &mut out);
            block_lets(body, &mut out);
        }
        ExprKind::Match { arms, .. } => {
            for arm in arms {
                pattern_names(&arm.pattern, &mut out);
            }
        }
        ExprKind::Lambda { params, .. } => {
            out.extend(params.iter().map(|p| (p.name.node.clone(), p.name.span.clone())));
        }
        _ => {}
    }
    out
}

fn pattern_names(pattern: &Pattern, out: &mut Vec<(String, Span)>) {
    out.extend(
        pattern
            .bindings()
            .into_iter()
            .map(|(name, span)| (name.to_string(), span.clone())),
    );
}

fn block_lets(block: &Block, out: &mut Vec<(String, Span)>) {
    for stmt in &block.stmts {
        if let Stmt::Let(local) = stmt {
            pattern_names(&local.pattern, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::build::*;

    fn let_at(name: &str, value: Expr, line: u32) -> Stmt {
        let mut stmt = let_(name, value);
        if let Stmt::Let(local) = &mut stmt {
            local.pattern = Pattern::Ident {
                span: Span::at(line, 5, 1),
                name: name.to_string(),
                mutable: false,
                by_ref: false,
            };
        }
        stmt
    }

    #[test]
    fn last_mention_ends_the_range() {
        let def = func("f")
            .body(block(
                vec![
                    let_at("a", int(1), 1),
                    let_at("b", ident("a").at(2, 9), 2),
                    expr_stmt(call(ident("g"), vec![ident("a").at(3, 3)])),
                ],
                Some(ident("b").at(4, 1)),
            ))
            .build();
        let ranges = LifetimeAnalyzer::new().analyze(&def);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].name, "a");
        assert_eq!(ranges[0].last_use.start.line, 3);
        assert_eq!(ranges[1].name, "b");
        assert_eq!(ranges[1].last_use.start.line, 4);
        assert!(ranges[0].overlaps(&ranges[1]));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        let first = LiveRange {
            name: "a".into(),
            defined: Span::at(1, 1, 1),
            last_use: Span::at(2, 1, 1),
        };
        let second = LiveRange {
            name: "b".into(),
            defined: Span::at(3, 1, 1),
            last_use: Span::at(5, 1, 1),
        };
        assert!(!first.overlaps(&second));
        assert!(second.contains(&Span::at(4, 2, 3)));
        assert!(first.is_used());
    }

    #[test]
    fn unused_binding_spans_its_definition() {
        let def = func("f").body(block(vec![let_at("idle", int(0), 1)], None)).build();
        let ranges = LifetimeAnalyzer::new().analyze(&def);
        assert_eq!(ranges.len(), 1);
        assert!(!ranges[0].is_used());
    }
}
