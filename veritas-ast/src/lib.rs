#![forbid(unsafe_code)]

pub mod build;
mod span;
mod types;
mod visit;

use serde::{Deserialize, Serialize};

pub use span::{Position, Span, Spanned};
pub use types::{Effect, EffectKind, PrimitiveKind, TypeExpr, TypeExprKind};
pub use visit::{walk_block, walk_expr, walk_exprs, walk_exprs_mut};

pub type Ident = Spanned<String>;

/// Identity of an expression node within one `Program`.
///
/// The type checker keys its expression → type table on this id, so ids must
/// be unique per program. `Program::renumber` restores that after a program is
/// deserialized or assembled by hand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub span: Span,
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(items: Vec<Item>) -> Self {
        let mut program = Self {
            span: Span::dummy(),
            items,
        };
        program.renumber();
        program
    }

    /// Assign dense, unique `ExprId`s in traversal order.
    pub fn renumber(&mut self) {
        let mut next = 0u32;
        walk_exprs_mut(self, &mut |expr: &mut Expr| {
            expr.id = ExprId(next);
            next += 1;
        });
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDef),
    Struct(StructDef),
    Enum(EnumDef),
    TypeAlias(TypeAlias),
    Const(ConstDef),
    Trait(TraitDef),
    Impl(ImplBlock),
    Import(Import),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericParam {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub bounds: Vec<Ident>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub span: Span,
    pub name: Ident,
    /// Lambda parameters and `self` may omit the annotation.
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<TypeExpr>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    /// `None` for trait method signatures.
    #[serde(default)]
    pub body: Option<Block>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    Requires,
    Ensures,
    Invariant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub span: Span,
    pub kind: ContractKind,
    pub condition: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub fields: Vec<FieldDef>,
}

/// Enum variant; tuple-style payload (`Some(T)`), empty for unit variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantDef {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub fields: Vec<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub variants: Vec<VariantDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeAlias {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub target: TypeExpr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstDef {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeExpr,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitDef {
    pub span: Span,
    pub name: Ident,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub methods: Vec<FunctionDef>,
    #[serde(default)]
    pub super_traits: Vec<Ident>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImplBlock {
    pub span: Span,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    pub target: TypeExpr,
    #[serde(default)]
    pub trait_name: Option<Ident>,
    pub methods: Vec<FunctionDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub span: Span,
    pub path: Vec<Ident>,
    #[serde(default)]
    pub alias: Option<Ident>,
    /// `use a::b::{C, D}`
    #[serde(default)]
    pub items: Vec<Ident>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
    /// Trailing expression without a semicolon; the block's value.
    #[serde(default)]
    pub tail: Option<Box<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let(LetStmt),
    Assign(AssignStmt),
    Expr(Expr),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(Span),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetStmt {
    pub span: Span,
    pub pattern: Pattern,
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    #[serde(default)]
    pub value: Option<Expr>,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub span: Span,
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakStmt {
    pub span: Span,
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub id: ExprId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self {
            id: ExprId::default(),
            span,
            kind,
        }
    }

    /// Re-anchor this node at `line:column` (builder convenience).
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::at(line, column, 1);
        self
    }

    /// The bound name when this expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_borrow(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Unary {
                op: UnaryOp::Ref | UnaryOp::RefMut,
                ..
            }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    /// `Color::Red`, `module::item`
    Path(Vec<Ident>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    Field {
        base: Box<Expr>,
        field: Ident,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Block,
        /// Either a block expression or a chained `if`.
        #[serde(default)]
        else_branch: Option<Box<Expr>>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Block(Block),
    Lambda {
        params: Vec<Param>,
        #[serde(default)]
        ret: Option<TypeExpr>,
        body: Box<Expr>,
        #[serde(default)]
        is_move: bool,
    },
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    Struct {
        name: Ident,
        fields: Vec<FieldInit>,
        /// `..base`
        #[serde(default)]
        base: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        ty: TypeExpr,
    },
    /// Postfix `?`.
    Try(Box<Expr>),
    Await(Box<Expr>),
    While {
        cond: Box<Expr>,
        body: Block,
    },
    Loop {
        body: Block,
    },
    For {
        pattern: Pattern,
        iterable: Box<Expr>,
        body: Block,
    },
    Range {
        #[serde(default)]
        start: Option<Box<Expr>>,
        #[serde(default)]
        end: Option<Box<Expr>>,
        #[serde(default)]
        inclusive: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub span: Span,
    pub name: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub span: Span,
    pub pattern: Pattern,
    #[serde(default)]
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Type suffix such as `42u64`.
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LiteralKind {
    Int(u64),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `&e`
    Ref,
    /// `&mut e`
    RefMut,
    Deref,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,

    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::Rem
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::Shl
                | BinOp::Shr
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard {
        span: Span,
    },
    Ident {
        span: Span,
        name: String,
        #[serde(default)]
        mutable: bool,
        #[serde(default)]
        by_ref: bool,
    },
    Literal {
        span: Span,
        value: Literal,
    },
    Tuple {
        span: Span,
        elems: Vec<Pattern>,
    },
    Struct {
        span: Span,
        name: Ident,
        fields: Vec<FieldPattern>,
        #[serde(default)]
        rest: bool,
    },
    /// `Option::Some(x)`, `Ok(v)`, `None`
    Enum {
        span: Span,
        path: Vec<Ident>,
        #[serde(default)]
        fields: Vec<Pattern>,
    },
    Or {
        span: Span,
        alternatives: Vec<Pattern>,
    },
    Range {
        span: Span,
        #[serde(default)]
        start: Option<Literal>,
        #[serde(default)]
        end: Option<Literal>,
        #[serde(default)]
        inclusive: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub span: Span,
    pub name: Ident,
    /// `None` binds the field under its own name (`Point { x, y }`).
    #[serde(default)]
    pub pattern: Option<Pattern>,
}

impl Pattern {
    pub fn span(&self) -> &Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Ident { span, .. }
            | Pattern::Literal { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::Struct { span, .. }
            | Pattern::Enum { span, .. }
            | Pattern::Or { span, .. }
            | Pattern::Range { span, .. } => span,
        }
    }

    /// Every name this pattern binds, in source order.
    pub fn bindings(&self) -> Vec<(&str, &Span)> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<(&'a str, &'a Span)>) {
        match self {
            Pattern::Ident { span, name, .. } => out.push((name.as_str(), span)),
            Pattern::Tuple { elems, .. } => elems.iter().for_each(|p| p.collect_bindings(out)),
            Pattern::Struct { fields, .. } => {
                for f in fields {
                    match &f.pattern {
                        Some(p) => p.collect_bindings(out),
                        None => out.push((f.name.node.as_str(), &f.name.span)),
                    }
                }
            }
            Pattern::Enum { fields, .. } => fields.iter().for_each(|p| p.collect_bindings(out)),
            // Alternatives bind the same names; the first one is representative.
            Pattern::Or { alternatives, .. } => {
                if let Some(first) = alternatives.first() {
                    first.collect_bindings(out);
                }
            }
            Pattern::Wildcard { .. } | Pattern::Literal { .. } | Pattern::Range { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn renumber_assigns_unique_ids() {
        let program = program(vec![
            func("main")
                .body(block(
                    vec![let_("x", int(1)), expr_stmt(call(ident("f"), vec![ident("x")]))],
                    None,
                ))
                .item(),
        ]);

        let mut ids = Vec::new();
        let mut copy = program.clone();
        walk_exprs_mut(&mut copy, &mut |e: &mut Expr| ids.push(e.id));
        let mut dedup = ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(ids.len(), dedup.len());
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn pattern_bindings_in_order() {
        let pat = pat_tuple(vec![pat_ident("a"), pat_wild(), pat_enum(&["Some"], vec![pat_ident("b")])]);
        let names: Vec<&str> = pat.bindings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn program_round_trips_through_json() {
        let original = program(vec![
            func("id")
                .generic("T")
                .param("x", ty("T"))
                .returns(ty("T"))
                .body(block(vec![], Some(ident("x"))))
                .item(),
        ]);
        let json = serde_json::to_string(&original).expect("serialize");
        let back: Program = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, back);
    }
}
