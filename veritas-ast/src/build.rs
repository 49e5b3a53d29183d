#![forbid(unsafe_code)]

//! Terse constructors for assembling a `Program` in memory.
//!
//! The parser is a separate collaborator; tests and embedders that want to
//! drive the semantic passes directly build trees with these helpers. Every
//! node gets a dummy span unless re-anchored with [`Expr::at`], and
//! [`program`] numbers expression ids.

use crate::{
    AssignStmt, BinOp, Block, Contract, ContractKind, ConstDef, Effect, EffectKind, EnumDef, Expr,
    ExprKind, FieldDef, FieldInit, FieldPattern, FunctionDef, GenericParam, Ident, ImplBlock,
    Import, Item, LetStmt, Literal, LiteralKind, MatchArm, Param, Pattern, PrimitiveKind, Program,
    ReturnStmt, Span, Spanned, Stmt, StructDef, TraitDef, TypeAlias, TypeExpr, TypeExprKind,
    UnaryOp, VariantDef,
};

fn sp() -> Span {
    Span::dummy()
}

pub fn name(s: &str) -> Ident {
    Spanned::new(sp(), s.to_string())
}

pub fn program(items: Vec<Item>) -> Program {
    Program::new(items)
}

// ---- types ----

/// A primitive if `s` names one, otherwise a single-segment path (`T`, `UserId`).
pub fn ty(s: &str) -> TypeExpr {
    match PrimitiveKind::from_name(s) {
        Some(p) => TypeExpr::new(sp(), TypeExprKind::Primitive(p)),
        None => TypeExpr::new(
            sp(),
            TypeExprKind::Path {
                segments: s.split("::").map(str::to_string).collect(),
                args: Vec::new(),
            },
        ),
    }
}

pub fn generic_ty(s: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::new(
        sp(),
        TypeExprKind::Path {
            segments: s.split("::").map(str::to_string).collect(),
            args,
        },
    )
}

pub fn unit_ty() -> TypeExpr {
    TypeExpr::unit(sp())
}

pub fn tuple_ty(elems: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::new(sp(), TypeExprKind::Tuple(elems))
}

pub fn array_ty(elem: TypeExpr) -> TypeExpr {
    TypeExpr::new(
        sp(),
        TypeExprKind::Array {
            elem: Box::new(elem),
            len: None,
        },
    )
}

pub fn ref_ty(inner: TypeExpr, mutable: bool) -> TypeExpr {
    TypeExpr::new(
        sp(),
        TypeExprKind::Reference {
            inner: Box::new(inner),
            mutable,
            lifetime: None,
        },
    )
}

/// `base as brand`
pub fn branded(base: TypeExpr, brand: &str) -> TypeExpr {
    TypeExpr::new(
        sp(),
        TypeExprKind::Branded {
            base: Box::new(base),
            brand: brand.to_string(),
        },
    )
}

pub fn fn_ty(params: Vec<TypeExpr>, ret: TypeExpr, effects: &[EffectKind]) -> TypeExpr {
    TypeExpr::new(
        sp(),
        TypeExprKind::Function {
            params,
            ret: Some(Box::new(ret)),
            effects: effects.iter().map(|k| effect(*k)).collect(),
        },
    )
}

pub fn effect(kind: EffectKind) -> Effect {
    Effect {
        span: sp(),
        kind,
        type_arg: None,
    }
}

// ---- expressions ----

fn lit(kind: LiteralKind) -> Expr {
    Expr::new(sp(), ExprKind::Literal(Literal { kind, suffix: None }))
}

pub fn int(v: u64) -> Expr {
    lit(LiteralKind::Int(v))
}

/// `42u64`
pub fn int_suffixed(v: u64, suffix: &str) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Literal(Literal {
            kind: LiteralKind::Int(v),
            suffix: Some(suffix.to_string()),
        }),
    )
}

pub fn float(v: f64) -> Expr {
    lit(LiteralKind::Float(v))
}

pub fn string(s: &str) -> Expr {
    lit(LiteralKind::Str(s.to_string()))
}

pub fn boolean(b: bool) -> Expr {
    lit(LiteralKind::Bool(b))
}

pub fn character(c: char) -> Expr {
    lit(LiteralKind::Char(c))
}

pub fn unit() -> Expr {
    lit(LiteralKind::Unit)
}

pub fn ident(s: &str) -> Expr {
    Expr::new(sp(), ExprKind::Ident(s.to_string()))
}

pub fn path(segments: &[&str]) -> Expr {
    Expr::new(sp(), ExprKind::Path(segments.iter().map(|s| name(s)).collect()))
}

pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
    )
}

/// `&e`
pub fn borrow(e: Expr) -> Expr {
    unary(UnaryOp::Ref, e)
}

/// `&mut e`
pub fn borrow_mut(e: Expr) -> Expr {
    unary(UnaryOp::RefMut, e)
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Call {
            callee: Box::new(callee),
            args,
        },
    )
}

pub fn method(receiver: Expr, m: &str, args: Vec<Expr>) -> Expr {
    Expr::new(
        sp(),
        ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: name(m),
            args,
        },
    )
}

pub fn field(base: Expr, f: &str) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Field {
            base: Box::new(base),
            field: name(f),
        },
    )
}

pub fn index(base: Expr, idx: Expr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Index {
            base: Box::new(base),
            index: Box::new(idx),
        },
    )
}

pub fn if_(cond: Expr, then_branch: Block, else_branch: Option<Expr>) -> Expr {
    Expr::new(
        sp(),
        ExprKind::If {
            cond: Box::new(cond),
            then_branch,
            else_branch: else_branch.map(Box::new),
        },
    )
}

pub fn match_(scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Match {
            scrutinee: Box::new(scrutinee),
            arms,
        },
    )
}

pub fn arm(pattern: Pattern, body: Expr) -> MatchArm {
    MatchArm {
        span: sp(),
        pattern,
        guard: None,
        body,
    }
}

pub fn guarded_arm(pattern: Pattern, guard: Expr, body: Expr) -> MatchArm {
    MatchArm {
        span: sp(),
        pattern,
        guard: Some(guard),
        body,
    }
}

pub fn block_expr(b: Block) -> Expr {
    Expr::new(sp(), ExprKind::Block(b))
}

/// Lambda with unannotated parameters.
pub fn lambda(params: &[&str], body: Expr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Lambda {
            params: params.iter().map(|p| untyped_param(p)).collect(),
            ret: None,
            body: Box::new(body),
            is_move: false,
        },
    )
}

pub fn tuple(elems: Vec<Expr>) -> Expr {
    Expr::new(sp(), ExprKind::Tuple(elems))
}

pub fn array(elems: Vec<Expr>) -> Expr {
    Expr::new(sp(), ExprKind::Array(elems))
}

pub fn struct_lit(n: &str, fields: Vec<(&str, Expr)>) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Struct {
            name: name(n),
            fields: fields
                .into_iter()
                .map(|(f, value)| FieldInit {
                    span: sp(),
                    name: name(f),
                    value,
                })
                .collect(),
            base: None,
        },
    )
}

pub fn cast(e: Expr, target: TypeExpr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Cast {
            expr: Box::new(e),
            ty: target,
        },
    )
}

/// Postfix `e?`
pub fn try_(e: Expr) -> Expr {
    Expr::new(sp(), ExprKind::Try(Box::new(e)))
}

pub fn await_(e: Expr) -> Expr {
    Expr::new(sp(), ExprKind::Await(Box::new(e)))
}

pub fn while_(cond: Expr, body: Block) -> Expr {
    Expr::new(
        sp(),
        ExprKind::While {
            cond: Box::new(cond),
            body,
        },
    )
}

pub fn loop_(body: Block) -> Expr {
    Expr::new(sp(), ExprKind::Loop { body })
}

pub fn for_(pattern: Pattern, iterable: Expr, body: Block) -> Expr {
    Expr::new(
        sp(),
        ExprKind::For {
            pattern,
            iterable: Box::new(iterable),
            body,
        },
    )
}

pub fn range(start: Expr, end: Expr) -> Expr {
    Expr::new(
        sp(),
        ExprKind::Range {
            start: Some(Box::new(start)),
            end: Some(Box::new(end)),
            inclusive: false,
        },
    )
}

// ---- statements and blocks ----

pub fn block(stmts: Vec<Stmt>, tail: Option<Expr>) -> Block {
    Block {
        span: sp(),
        stmts,
        tail: tail.map(Box::new),
    }
}

pub fn let_(n: &str, value: Expr) -> Stmt {
    Stmt::Let(LetStmt {
        span: sp(),
        pattern: pat_ident(n),
        ty: None,
        value: Some(value),
        mutable: false,
    })
}

pub fn let_typed(n: &str, declared: TypeExpr, value: Expr) -> Stmt {
    Stmt::Let(LetStmt {
        span: sp(),
        pattern: pat_ident(n),
        ty: Some(declared),
        value: Some(value),
        mutable: false,
    })
}

pub fn let_pat(pattern: Pattern, value: Expr) -> Stmt {
    Stmt::Let(LetStmt {
        span: sp(),
        pattern,
        ty: None,
        value: Some(value),
        mutable: false,
    })
}

pub fn expr_stmt(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::Assign(AssignStmt {
        span: sp(),
        target,
        value,
    })
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt { span: sp(), value })
}

// ---- patterns ----

pub fn pat_wild() -> Pattern {
    Pattern::Wildcard { span: sp() }
}

pub fn pat_ident(n: &str) -> Pattern {
    Pattern::Ident {
        span: sp(),
        name: n.to_string(),
        mutable: false,
        by_ref: false,
    }
}

pub fn pat_int(v: u64) -> Pattern {
    Pattern::Literal {
        span: sp(),
        value: Literal {
            kind: LiteralKind::Int(v),
            suffix: None,
        },
    }
}

pub fn pat_bool(b: bool) -> Pattern {
    Pattern::Literal {
        span: sp(),
        value: Literal {
            kind: LiteralKind::Bool(b),
            suffix: None,
        },
    }
}

pub fn pat_tuple(elems: Vec<Pattern>) -> Pattern {
    Pattern::Tuple { span: sp(), elems }
}

pub fn pat_enum(path: &[&str], fields: Vec<Pattern>) -> Pattern {
    Pattern::Enum {
        span: sp(),
        path: path.iter().map(|s| name(s)).collect(),
        fields,
    }
}

/// `Name { a, b }` binding each field under its own name.
pub fn pat_struct(n: &str, fields: &[&str]) -> Pattern {
    Pattern::Struct {
        span: sp(),
        name: name(n),
        fields: fields
            .iter()
            .map(|f| FieldPattern {
                span: sp(),
                name: name(f),
                pattern: None,
            })
            .collect(),
        rest: false,
    }
}

pub fn pat_or(alternatives: Vec<Pattern>) -> Pattern {
    Pattern::Or {
        span: sp(),
        alternatives,
    }
}

// ---- items ----

pub fn param(n: &str, t: TypeExpr) -> Param {
    Param {
        span: sp(),
        name: name(n),
        ty: Some(t),
        mutable: false,
    }
}

pub fn untyped_param(n: &str) -> Param {
    Param {
        span: sp(),
        name: name(n),
        ty: None,
        mutable: false,
    }
}

fn generic_param(n: &str) -> GenericParam {
    GenericParam {
        span: sp(),
        name: name(n),
        bounds: Vec::new(),
    }
}

/// Start building `fn <name>`.
pub fn func(n: &str) -> FunctionBuilder {
    FunctionBuilder {
        def: FunctionDef {
            span: sp(),
            name: name(n),
            generics: Vec::new(),
            params: Vec::new(),
            ret: None,
            effects: Vec::new(),
            contracts: Vec::new(),
            body: None,
            is_async: false,
        },
    }
}

pub struct FunctionBuilder {
    def: FunctionDef,
}

impl FunctionBuilder {
    pub fn generic(mut self, n: &str) -> Self {
        self.def.generics.push(generic_param(n));
        self
    }

    pub fn param(mut self, n: &str, t: TypeExpr) -> Self {
        self.def.params.push(param(n, t));
        self
    }

    pub fn untyped_param(mut self, n: &str) -> Self {
        self.def.params.push(untyped_param(n));
        self
    }

    pub fn returns(mut self, t: TypeExpr) -> Self {
        self.def.ret = Some(t);
        self
    }

    pub fn effect(mut self, kind: EffectKind) -> Self {
        self.def.effects.push(effect(kind));
        self
    }

    pub fn requires(mut self, condition: Expr) -> Self {
        self.def.contracts.push(Contract {
            span: sp(),
            kind: ContractKind::Requires,
            condition,
        });
        self
    }

    pub fn ensures(mut self, condition: Expr) -> Self {
        self.def.contracts.push(Contract {
            span: sp(),
            kind: ContractKind::Ensures,
            condition,
        });
        self
    }

    pub fn body(mut self, b: Block) -> Self {
        self.def.body = Some(b);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.def.span = Span::at(line, column, 1);
        self.def.name.span = Span::at(line, column + 3, 1);
        self
    }

    pub fn build(self) -> FunctionDef {
        self.def
    }

    pub fn item(self) -> Item {
        Item::Function(self.def)
    }
}

/// `type <name> = <target>;`
pub fn alias(n: &str, target: TypeExpr) -> Item {
    Item::TypeAlias(TypeAlias {
        span: sp(),
        name: name(n),
        generics: Vec::new(),
        target,
    })
}

/// `type <name> = <base> as <name>;`
pub fn branded_alias(n: &str, base: TypeExpr) -> Item {
    alias(n, branded(base, n))
}

pub fn struct_def(n: &str, generics: &[&str], fields: Vec<(&str, TypeExpr)>) -> Item {
    Item::Struct(StructDef {
        span: sp(),
        name: name(n),
        generics: generics.iter().map(|g| generic_param(g)).collect(),
        fields: fields
            .into_iter()
            .map(|(f, t)| FieldDef {
                span: sp(),
                name: name(f),
                ty: t,
            })
            .collect(),
    })
}

pub fn enum_def(n: &str, generics: &[&str], variants: Vec<(&str, Vec<TypeExpr>)>) -> Item {
    Item::Enum(EnumDef {
        span: sp(),
        name: name(n),
        generics: generics.iter().map(|g| generic_param(g)).collect(),
        variants: variants
            .into_iter()
            .map(|(v, fields)| VariantDef {
                span: sp(),
                name: name(v),
                fields,
            })
            .collect(),
    })
}

pub fn const_def(n: &str, t: TypeExpr, value: Expr) -> Item {
    Item::Const(ConstDef {
        span: sp(),
        name: name(n),
        ty: t,
        value,
    })
}

pub fn trait_def(n: &str, methods: Vec<FunctionDef>) -> Item {
    Item::Trait(TraitDef {
        span: sp(),
        name: name(n),
        generics: Vec::new(),
        methods,
        super_traits: Vec::new(),
    })
}

pub fn impl_block(target: TypeExpr, trait_name: Option<&str>, methods: Vec<FunctionDef>) -> Item {
    Item::Impl(ImplBlock {
        span: sp(),
        generics: Vec::new(),
        target,
        trait_name: trait_name.map(name),
        methods,
    })
}

pub fn import(segments: &[&str]) -> Item {
    Item::Import(Import {
        span: sp(),
        path: segments.iter().map(|s| name(s)).collect(),
        alias: None,
        items: Vec::new(),
    })
}

/// `a + b`
pub fn add(a: Expr, b: Expr) -> Expr {
    binary(BinOp::Add, a, b)
}
