#![forbid(unsafe_code)]

//! Pre-order expression walkers, in a shared and a mutable flavour.

use crate::{Block, Expr, ExprKind, FunctionDef, Item, Program, Stmt};

macro_rules! expr_walker {
    ($walk_item:ident, $walk_fn:ident, $walk_block:ident, $walk_expr:ident, $($mutability:tt)?) => {
        fn $walk_item(item: &$($mutability)? Item, f: &mut dyn FnMut(&$($mutability)? Expr)) {
            match item {
                Item::Function(func) => $walk_fn(func, f),
                Item::Const(c) => $walk_expr(&$($mutability)? c.value, f),
                Item::Trait(t) => {
                    for m in &$($mutability)? t.methods {
                        $walk_fn(m, f);
                    }
                }
                Item::Impl(i) => {
                    for m in &$($mutability)? i.methods {
                        $walk_fn(m, f);
                    }
                }
                Item::Struct(_) | Item::Enum(_) | Item::TypeAlias(_) | Item::Import(_) => {}
            }
        }

        fn $walk_fn(func: &$($mutability)? FunctionDef, f: &mut dyn FnMut(&$($mutability)? Expr)) {
            for contract in &$($mutability)? func.contracts {
                $walk_expr(&$($mutability)? contract.condition, f);
            }
            if let Some(body) = &$($mutability)? func.body {
                $walk_block(body, f);
            }
        }

        pub(crate) fn $walk_block(block: &$($mutability)? Block, f: &mut dyn FnMut(&$($mutability)? Expr)) {
            for stmt in &$($mutability)? block.stmts {
                match stmt {
                    Stmt::Let(l) => {
                        if let Some(v) = &$($mutability)? l.value {
                            $walk_expr(v, f);
                        }
                    }
                    Stmt::Assign(a) => {
                        $walk_expr(&$($mutability)? a.target, f);
                        $walk_expr(&$($mutability)? a.value, f);
                    }
                    Stmt::Expr(e) => $walk_expr(e, f),
                    Stmt::Return(r) => {
                        if let Some(v) = &$($mutability)? r.value {
                            $walk_expr(v, f);
                        }
                    }
                    Stmt::Break(b) => {
                        if let Some(v) = &$($mutability)? b.value {
                            $walk_expr(v, f);
                        }
                    }
                    Stmt::Continue(_) => {}
                }
            }
            if let Some(tail) = &$($mutability)? block.tail {
                $walk_expr(tail, f);
            }
        }

        pub(crate) fn $walk_expr(expr: &$($mutability)? Expr, f: &mut dyn FnMut(&$($mutability)? Expr)) {
            f(expr);
            match &$($mutability)? expr.kind {
                ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Path(_) => {}
                ExprKind::Binary { left, right, .. } => {
                    $walk_expr(left, f);
                    $walk_expr(right, f);
                }
                ExprKind::Unary { operand, .. } => $walk_expr(operand, f),
                ExprKind::Call { callee, args } => {
                    $walk_expr(callee, f);
                    for a in args {
                        $walk_expr(a, f);
                    }
                }
                ExprKind::MethodCall { receiver, args, .. } => {
                    $walk_expr(receiver, f);
                    for a in args {
                        $walk_expr(a, f);
                    }
                }
                ExprKind::Field { base, .. } => $walk_expr(base, f),
                ExprKind::Index { base, index } => {
                    $walk_expr(base, f);
                    $walk_expr(index, f);
                }
                ExprKind::If {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    $walk_expr(cond, f);
                    $walk_block(then_branch, f);
                    if let Some(e) = else_branch {
                        $walk_expr(e, f);
                    }
                }
                ExprKind::Match { scrutinee, arms } => {
                    $walk_expr(scrutinee, f);
                    for arm in arms {
                        if let Some(g) = &$($mutability)? arm.guard {
                            $walk_expr(g, f);
                        }
                        $walk_expr(&$($mutability)? arm.body, f);
                    }
                }
                ExprKind::Block(b) => $walk_block(b, f),
                ExprKind::Lambda { body, .. } => $walk_expr(body, f),
                ExprKind::Tuple(elems) | ExprKind::Array(elems) => {
                    for e in elems {
                        $walk_expr(e, f);
                    }
                }
                ExprKind::Struct { fields, base, .. } => {
                    for fi in fields {
                        $walk_expr(&$($mutability)? fi.value, f);
                    }
                    if let Some(b) = base {
                        $walk_expr(b, f);
                    }
                }
                ExprKind::Cast { expr: inner, .. }
                | ExprKind::Try(inner)
                | ExprKind::Await(inner) => $walk_expr(inner, f),
                ExprKind::While { cond, body } => {
                    $walk_expr(cond, f);
                    $walk_block(body, f);
                }
                ExprKind::Loop { body } => $walk_block(body, f),
                ExprKind::For { iterable, body, .. } => {
                    $walk_expr(iterable, f);
                    $walk_block(body, f);
                }
                ExprKind::Range { start, end, .. } => {
                    if let Some(s) = start {
                        $walk_expr(s, f);
                    }
                    if let Some(e) = end {
                        $walk_expr(e, f);
                    }
                }
            }
        }
    };
}

expr_walker!(item_ref, function_ref, block_ref, expr_ref,);
expr_walker!(item_mut, function_mut, block_mut, expr_mut, mut);

/// Visit every expression node in `program`, parents before children.
pub fn walk_exprs_mut(program: &mut Program, f: &mut dyn FnMut(&mut Expr)) {
    for item in &mut program.items {
        item_mut(item, f);
    }
}

/// Visit every expression node in `program`, parents before children.
pub fn walk_exprs(program: &Program, f: &mut dyn FnMut(&Expr)) {
    for item in &program.items {
        item_ref(item, f);
    }
}

/// Visit `expr` and every expression nested inside it, including blocks.
pub fn walk_expr(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    expr_ref(expr, f);
}

/// Visit every expression in `block`, statement by statement.
pub fn walk_block(block: &Block, f: &mut dyn FnMut(&Expr)) {
    block_ref(block, f);
}
