#![forbid(unsafe_code)]

//! Move and borrow checking over the AST, one function at a time.
//!
//! The checker reasons about names only; inferred types are never consulted.
//! Every bare identifier passed by value into a call, a `let` initializer,
//! an assignment or a `return` moves it. Explicit `&`/`&mut` borrow instead.
//! State is a [`FlowState`] value: branch points clone it and merge points
//! join the copies, so a binding is moved after a conditional only when every
//! path moved it, and no borrow survives a merge.
//!
//! A borrow taken anywhere in the value a `let` or assignment stores, such as
//! a tuple element or a call argument, is held by the bound name until the
//! block declaring that name ends. Other borrows end with their statement.

mod flow;

use std::collections::BTreeMap;

use tracing::debug;
use veritas_ast::{
    Block, Expr, ExprKind, FunctionDef, Item, Pattern, Program, Span, Stmt, UnaryOp, walk_expr,
};

use crate::error::OwnershipError;
use crate::lifetime::{LifetimeAnalyzer, LiveRange};

pub use flow::{ActiveBorrow, BorrowHolder, BorrowKind, FlowState, VariableState};

/// How an expression's value is consumed by its context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Use,
    Move,
}

#[derive(Debug, Default)]
pub struct OwnershipChecker {
    track_lifetimes: bool,
    state: FlowState,
    errors: Vec<OwnershipError>,
    live_ranges: BTreeMap<String, Vec<LiveRange>>,
    /// Binding that will hold a borrow taken by the current `let`.
    holder: Option<BorrowHolder>,
}

impl OwnershipChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compute per-function live ranges.
    pub fn track_lifetimes(mut self, enabled: bool) -> Self {
        self.track_lifetimes = enabled;
        self
    }

    pub fn errors(&self) -> &[OwnershipError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<OwnershipError> {
        std::mem::take(&mut self.errors)
    }

    /// Function name → live ranges, when lifetime tracking is enabled.
    pub fn live_ranges(&self) -> &BTreeMap<String, Vec<LiveRange>> {
        &self.live_ranges
    }

    #[tracing::instrument(level = "debug", skip_all, fields(items = program.items.len()))]
    pub fn check_program(&mut self, program: &Program) -> bool {
        self.errors.clear();
        self.live_ranges.clear();

        for item in &program.items {
            match item {
                Item::Function(def) => self.check_function(def, &def.name.node),
                Item::Impl(block) => {
                    let target = block.target.to_string();
                    for method in &block.methods {
                        self.check_function(method, &format!("{target}::{}", method.name.node));
                    }
                }
                Item::Trait(def) => {
                    for method in &def.methods {
                        self.check_function(method, &format!("{}::{}", def.name.node, method.name.node));
                    }
                }
                Item::Const(def) => {
                    self.state = FlowState::new();
                    self.check_expr(&def.value, Mode::Use);
                }
                Item::Struct(_) | Item::Enum(_) | Item::TypeAlias(_) | Item::Import(_) => {}
            }
        }

        debug!(errors = self.errors.len(), "ownership checking complete");
        self.errors.is_empty()
    }

    fn check_function(&mut self, def: &FunctionDef, name: &str) {
        let Some(body) = &def.body else { return };
        debug!(function = name, "checking ownership");

        self.state = FlowState::new();
        self.holder = None;
        for param in &def.params {
            self.state.declare(param.name.node.clone());
        }
        for contract in &def.contracts {
            self.check_expr(&contract.condition, Mode::Use);
            self.state.release_temporaries();
        }
        // The body's value is returned to the caller.
        self.check_block(body, Mode::Move);

        if self.track_lifetimes {
            let ranges = LifetimeAnalyzer::new().analyze(def);
            self.live_ranges.insert(name.to_string(), ranges);
        }
    }

    fn check_block(&mut self, block: &Block, mode: Mode) {
        // Only the tail flows into an enclosing `let`.
        let holder = self.holder.take();
        self.state.push_frame();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.holder = holder;
        if let Some(tail) = &block.tail {
            self.check_expr(tail, mode);
        }
        self.state.pop_frame();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let(local) => {
                if let Some(value) = &local.value {
                    let depth = self.state.innermost();
                    let holder = local
                        .pattern
                        .bindings()
                        .first()
                        .filter(|_| holds_borrow(value))
                        .map(|(name, _)| BorrowHolder {
                            name: name.to_string(),
                            depth,
                        });
                    let outer = std::mem::replace(&mut self.holder, holder);
                    self.check_expr(value, Mode::Move);
                    self.holder = outer;
                }
                self.declare_pattern(&local.pattern);
            }
            Stmt::Assign(assign) => {
                if let Some(target) = assign.target.as_ident() {
                    let holder = self
                        .state
                        .frame_of(target)
                        .filter(|_| holds_borrow(&assign.value))
                        .map(|depth| BorrowHolder {
                            name: target.to_string(),
                            depth,
                        });
                    let outer = std::mem::replace(&mut self.holder, holder);
                    self.check_expr(&assign.value, Mode::Move);
                    self.holder = outer;
                    if let Some(var) = self.state.lookup_mut(target) {
                        var.reinitialize();
                    }
                } else {
                    self.check_expr(&assign.value, Mode::Move);
                    self.check_expr(&assign.target, Mode::Use);
                }
            }
            Stmt::Expr(expr) => self.check_expr(expr, Mode::Use),
            Stmt::Return(ret) => {
                if let Some(value) = &ret.value {
                    self.check_expr(value, Mode::Move);
                }
            }
            Stmt::Break(brk) => {
                if let Some(value) = &brk.value {
                    self.check_expr(value, Mode::Move);
                }
            }
            Stmt::Continue(_) => {}
        }
        self.state.release_temporaries();
    }

    fn declare_pattern(&mut self, pattern: &Pattern) {
        for (name, _) in pattern.bindings() {
            self.state.declare(name);
        }
    }

    fn check_expr(&mut self, expr: &Expr, mode: Mode) {
        let span = &expr.span;
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Path(_) => {}
            ExprKind::Ident(name) => {
                self.use_var(name, span);
                if mode == Mode::Move {
                    if let Some(var) = self.state.lookup_mut(name) {
                        var.mark_moved(span);
                    }
                }
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Ref => self.borrow_expr(operand, BorrowKind::Immutable, span),
                UnaryOp::RefMut => self.borrow_expr(operand, BorrowKind::Mutable, span),
                UnaryOp::Neg | UnaryOp::Not | UnaryOp::Deref => self.check_expr(operand, Mode::Use),
            },
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left, Mode::Use);
                self.check_expr(right, Mode::Use);
            }
            ExprKind::Call { callee, args } => {
                self.check_expr(callee, Mode::Use);
                for arg in args {
                    self.check_expr(arg, Mode::Move);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.check_expr(receiver, Mode::Use);
                for arg in args {
                    self.check_expr(arg, Mode::Move);
                }
            }
            ExprKind::Field { base, .. } => self.check_expr(base, Mode::Use),
            ExprKind::Index { base, index } => {
                self.check_expr(base, Mode::Use);
                self.check_expr(index, Mode::Use);
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(cond, Mode::Use);
                let before = self.state.clone();
                self.check_block(then_branch, mode);
                let after_then = std::mem::replace(&mut self.state, before.clone());
                let after_else = match else_branch {
                    Some(other) => {
                        self.check_expr(other, mode);
                        std::mem::take(&mut self.state)
                    }
                    None => before,
                };
                self.state = after_then.join(&after_else);
            }
            ExprKind::Match { scrutinee, arms } => {
                self.check_expr(scrutinee, Mode::Use);
                let before = self.state.clone();
                let mut exits = Vec::with_capacity(arms.len());
                for arm in arms {
                    self.state = before.clone();
                    self.state.push_frame();
                    self.declare_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.check_expr(guard, Mode::Use);
                    }
                    self.check_expr(&arm.body, mode);
                    self.state.pop_frame();
                    exits.push(std::mem::take(&mut self.state));
                }
                self.state = FlowState::join_all(exits).unwrap_or_else(|| {
                    let mut state = before;
                    state.clear_borrows();
                    state
                });
            }
            ExprKind::Block(block) => self.check_block(block, mode),
            ExprKind::Lambda {
                params,
                body,
                is_move,
                ..
            } => {
                let outer = self.state.clone();
                let holder = self.holder.take();
                self.state.push_frame();
                for param in params {
                    self.state.declare(param.name.node.clone());
                }
                self.check_expr(body, Mode::Move);
                self.state = outer;
                self.holder = holder;
                if *is_move {
                    self.move_captures(params.iter().map(|p| p.name.node.as_str()).collect(), body, span);
                }
            }
            ExprKind::Tuple(elems) | ExprKind::Array(elems) => {
                for elem in elems {
                    self.check_expr(elem, Mode::Move);
                }
            }
            ExprKind::Struct { fields, base, .. } => {
                for init in fields {
                    self.check_expr(&init.value, Mode::Move);
                }
                if let Some(base) = base {
                    self.check_expr(base, Mode::Move);
                }
            }
            ExprKind::Cast { expr: inner, .. } | ExprKind::Try(inner) | ExprKind::Await(inner) => {
                self.check_expr(inner, mode)
            }
            ExprKind::While { cond, body } => {
                let before = self.state.clone();
                self.check_expr(cond, Mode::Use);
                self.check_block(body, Mode::Use);
                self.state = before.join(&self.state);
            }
            ExprKind::Loop { body } => {
                self.check_block(body, Mode::Use);
                self.state.clear_borrows();
            }
            ExprKind::For {
                pattern,
                iterable,
                body,
            } => {
                self.check_expr(iterable, Mode::Move);
                self.state.release_temporaries();
                let before = self.state.clone();
                self.state.push_frame();
                self.declare_pattern(pattern);
                self.check_block(body, Mode::Use);
                self.state.pop_frame();
                self.state = before.join(&self.state);
            }
            ExprKind::Range { start, end, .. } => {
                for bound in start.iter().chain(end.iter()) {
                    self.check_expr(bound, Mode::Use);
                }
            }
        }
    }

    fn use_var(&mut self, name: &str, span: &Span) {
        let Some(var) = self.state.lookup(name) else { return };
        if var.moved {
            let err = OwnershipError::new(format!("use of moved value: `{name}`"), span.clone())
                .moved_at(var.move_location.clone())
                .with_help(format!("borrow `{name}` with `&{name}` instead of moving it"));
            self.errors.push(err);
        }
    }

    /// `&place` / `&mut place`: borrows the root binding of a field or index
    /// chain; any other operand is just evaluated.
    fn borrow_expr(&mut self, operand: &Expr, kind: BorrowKind, span: &Span) {
        match root_binding(operand) {
            Some(name) => {
                self.borrow_var(name, kind, span);
                if !matches!(operand.kind, ExprKind::Ident(_)) {
                    self.check_place_indices(operand);
                }
            }
            None => self.check_expr(operand, Mode::Use),
        }
    }

    fn check_place_indices(&mut self, place: &Expr) {
        match &place.kind {
            ExprKind::Field { base, .. } => self.check_place_indices(base),
            ExprKind::Index { base, index } => {
                self.check_place_indices(base);
                self.check_expr(index, Mode::Use);
            }
            _ => {}
        }
    }

    fn borrow_var(&mut self, name: &str, kind: BorrowKind, span: &Span) {
        let holder = self.holder.clone();
        let Some(var) = self.state.lookup_mut(name) else { return };

        let conflict = if var.moved {
            Some(
                OwnershipError::new(format!("cannot borrow moved value: `{name}`"), span.clone())
                    .moved_at(var.move_location.clone()),
            )
        } else {
            match kind {
                BorrowKind::Immutable if var.has_mutable_borrow() => Some(OwnershipError::new(
                    format!("cannot borrow `{name}` as immutable, already borrowed as mutable"),
                    span.clone(),
                )),
                BorrowKind::Mutable if !var.active_borrows.is_empty() => Some(OwnershipError::new(
                    format!("cannot borrow `{name}` as mutable, already borrowed"),
                    span.clone(),
                )),
                _ => None,
            }
        };

        match conflict {
            Some(err) => self.errors.push(err),
            None => {
                if kind == BorrowKind::Mutable {
                    var.active_borrows.clear();
                }
                var.active_borrows.push(ActiveBorrow {
                    kind,
                    span: span.clone(),
                    holder,
                });
            }
        }
    }

    /// A `move` closure takes ownership of every outer binding it mentions.
    fn move_captures(&mut self, params: Vec<&str>, body: &Expr, span: &Span) {
        let mut captured = Vec::new();
        walk_expr(body, &mut |e: &Expr| {
            if let Some(name) = e.as_ident() {
                if !params.contains(&name) && !captured.iter().any(|c: &String| c == name) {
                    captured.push(name.to_string());
                }
            }
        });
        for name in captured {
            if let Some(var) = self.state.lookup_mut(&name) {
                var.mark_moved(span);
            }
        }
    }
}

/// Whether the value of `expr` can carry a borrow taken inside it, so the
/// binding it initializes keeps that borrow alive.
fn holds_borrow(expr: &Expr) -> bool {
    if expr.is_borrow() {
        return true;
    }
    match &expr.kind {
        ExprKind::Tuple(elems) | ExprKind::Array(elems) => elems.iter().any(holds_borrow),
        ExprKind::Call { args, .. } | ExprKind::MethodCall { args, .. } => args.iter().any(holds_borrow),
        ExprKind::Struct { fields, base, .. } => {
            fields.iter().any(|f| holds_borrow(&f.value)) || base.as_deref().is_some_and(holds_borrow)
        }
        ExprKind::Cast { expr: inner, .. } | ExprKind::Try(inner) | ExprKind::Await(inner) => {
            holds_borrow(inner)
        }
        ExprKind::Block(block) => block.tail.as_deref().is_some_and(holds_borrow),
        _ => false,
    }
}

fn root_binding(place: &Expr) -> Option<&str> {
    match &place.kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Field { base, .. } | ExprKind::Index { base, .. } => root_binding(base),
        _ => None,
    }
}
