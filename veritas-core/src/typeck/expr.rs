#![forbid(unsafe_code)]

use std::collections::HashSet;

use veritas_ast::{
    Block, Expr, ExprKind, FieldInit, Ident, LetStmt, Literal, LiteralKind, Pattern, PrimitiveKind,
    Span, Stmt, UnaryOp,
};

use super::members::{Deferred, EffectSite, MemberCall};
use super::{FnFrame, LoopFrame, TypeChecker};
use crate::constraints::ConstraintOrigin;
use crate::error::ErrorCategory;
use crate::types::{ARRAY, EffectRow, InferredType, RANGE, RESULT, TypeScheme, generalize};

impl TypeChecker {
    pub(super) fn infer_block(&mut self, block: &Block) -> InferredType {
        self.env.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        let ty = match &block.tail {
            Some(tail) => self.infer_expr(tail),
            // A block ending in `return`/`break`/`continue` has no value of
            // its own; leave it free so it fits any context.
            None if diverges(block) => self.fresh(),
            None => InferredType::unit(),
        };
        self.env.pop_scope();
        ty
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let(local) => self.check_let(local),
            Stmt::Assign(assign) => {
                let target = self.infer_expr(&assign.target);
                let value = self.infer_expr(&assign.value);
                self.constrain(target, value, &assign.value.span, ConstraintOrigin::Assignment);
            }
            Stmt::Expr(expr) => {
                self.infer_expr(expr);
            }
            Stmt::Return(ret) => {
                let ty = match &ret.value {
                    Some(value) => self.infer_expr(value),
                    None => InferredType::unit(),
                };
                match self.fn_stack.last().map(|f| f.ret.clone()) {
                    Some(expected) => self.constrain(expected, ty, &ret.span, ConstraintOrigin::Return),
                    None => self.error(ErrorCategory::Type, "`return` outside of a function", &ret.span),
                }
            }
            Stmt::Break(brk) => {
                let ty = match &brk.value {
                    Some(value) => self.infer_expr(value),
                    None => InferredType::unit(),
                };
                match self.loops.last().cloned() {
                    None => self.error(ErrorCategory::Type, "`break` outside of a loop", &brk.span),
                    Some(LoopFrame { break_ty: Some(expected) }) => {
                        self.constrain(expected, ty, &brk.span, ConstraintOrigin::Branch)
                    }
                    Some(LoopFrame { break_ty: None }) if brk.value.is_some() => self.error(
                        ErrorCategory::Type,
                        "`break` with a value is only allowed inside `loop`",
                        &brk.span,
                    ),
                    Some(_) => {}
                }
            }
            Stmt::Continue(span) => {
                if self.loops.is_empty() {
                    self.error(ErrorCategory::Type, "`continue` outside of a loop", span);
                }
            }
        }
    }

    fn check_let(&mut self, local: &LetStmt) {
        let value = local.value.as_ref().map(|v| (self.infer_expr(v), &v.span));
        let declared = local.ty.as_ref().map(|t| self.resolve_type(t));
        let ty = match (declared, value) {
            (Some(declared), Some((actual, span))) => {
                self.constrain(declared.clone(), actual, span, ConstraintOrigin::Annotation);
                declared
            }
            (Some(declared), None) => declared,
            (None, Some((actual, _))) => actual,
            (None, None) => self.fresh(),
        };

        match &local.pattern {
            Pattern::Ident { name, mutable, .. }
                if local.value.is_some()
                    && !local.mutable
                    && !*mutable
                    && !self.constructors.contains_key(name) =>
            {
                let scheme = self.generalize_binding(ty);
                self.env.bind(name.clone(), scheme);
            }
            pattern => self.check_pattern(pattern, &ty),
        }
    }

    /// Solve what has been collected so far, then quantify the solved type
    /// over variables the solved environment does not mention. Stays
    /// monomorphic when the prefix does not solve.
    fn generalize_binding(&mut self, ty: InferredType) -> TypeScheme {
        if self.solver.solve_pending(&self.constraints).is_err() {
            return TypeScheme::mono(ty);
        }
        let solved = self.solver.apply(&ty);
        let subst = self.solver.substitution();
        let mut monomorphic = self.env.free_vars(subst);
        // Variables still awaiting member resolution or tied to an enclosing
        // return/break type must not be quantified.
        let pending = self
            .deferred
            .iter()
            .flat_map(|d| d.types())
            .chain(self.fn_stack.iter().map(|f| &f.ret))
            .chain(self.loops.iter().filter_map(|l| l.break_ty.as_ref()));
        for t in pending {
            monomorphic.extend(subst.apply(t).free_vars());
        }
        generalize(&monomorphic, solved)
    }

    pub(super) fn infer_expr(&mut self, expr: &Expr) -> InferredType {
        let ty = self.infer_expr_kind(expr);
        self.expr_types.insert(expr.id, ty.clone());
        ty
    }

    fn infer_expr_kind(&mut self, expr: &Expr) -> InferredType {
        let span = &expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal_type(lit, span),
            ExprKind::Ident(name) => match self.env.lookup(name).cloned() {
                Some(scheme) => self.instantiate(&scheme),
                None => {
                    self.error(ErrorCategory::Name, format!("Undefined variable `{name}`"), span);
                    self.fresh()
                }
            },
            ExprKind::Path(segments) => {
                let name = join_path(segments.iter().map(|s| s.node.as_str()));
                match self.env.lookup(&name).cloned() {
                    Some(scheme) => self.instantiate(&scheme),
                    None => {
                        self.error(ErrorCategory::Name, format!("undefined path `{name}`"), span);
                        self.fresh()
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.infer_expr(left);
                let r = self.infer_expr(right);
                if op.is_logical() {
                    self.constrain(InferredType::bool(), l, &left.span, ConstraintOrigin::Operand);
                    self.constrain(InferredType::bool(), r, &right.span, ConstraintOrigin::Operand);
                    InferredType::bool()
                } else if op.is_comparison() {
                    self.constrain(l, r, &right.span, ConstraintOrigin::Operand);
                    InferredType::bool()
                } else {
                    self.constrain(l.clone(), r, &right.span, ConstraintOrigin::Operand);
                    l
                }
            }
            ExprKind::Unary { op, operand } => {
                let t = self.infer_expr(operand);
                match op {
                    UnaryOp::Not => {
                        self.constrain(InferredType::bool(), t, &operand.span, ConstraintOrigin::Operand);
                        InferredType::bool()
                    }
                    UnaryOp::Neg | UnaryOp::Ref | UnaryOp::RefMut | UnaryOp::Deref => t,
                }
            }
            ExprKind::Call { callee, args } => self.infer_call(callee, args, span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver_ty = self.infer_expr(receiver);
                let args: Vec<InferredType> = args.iter().map(|a| self.infer_expr(a)).collect();
                let ret = self.fresh();
                let caller = self.fn_stack.last().map(|f| (f.name.clone(), f.effects.clone()));
                self.deferred.push(Deferred::Method(MemberCall {
                    receiver: receiver_ty,
                    method: method.node.clone(),
                    args,
                    ret: ret.clone(),
                    caller,
                    span: span.clone(),
                }));
                ret
            }
            ExprKind::Field { base, field } => {
                let base = self.infer_expr(base);
                let result = self.fresh();
                self.deferred.push(Deferred::Field {
                    base,
                    field: field.node.clone(),
                    result: result.clone(),
                    span: field.span.clone(),
                });
                result
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.infer_expr(base);
                self.infer_expr(index);
                let elem = self.fresh();
                self.constrain(
                    InferredType::generic(ARRAY, vec![elem.clone()]),
                    base_ty,
                    &base.span,
                    ConstraintOrigin::Element,
                );
                elem
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.infer_expr(cond);
                self.constrain(InferredType::bool(), c, &cond.span, ConstraintOrigin::Condition);
                let then_ty = self.infer_block(then_branch);
                match else_branch {
                    Some(other) => {
                        let else_ty = self.infer_expr(other);
                        self.constrain(then_ty.clone(), else_ty, &other.span, ConstraintOrigin::Branch);
                        then_ty
                    }
                    None => InferredType::unit(),
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                let scrutinee_ty = self.infer_expr(scrutinee);
                let result = self.fresh();
                for arm in arms {
                    self.env.push_scope();
                    self.check_pattern(&arm.pattern, &scrutinee_ty);
                    if let Some(guard) = &arm.guard {
                        let g = self.infer_expr(guard);
                        self.constrain(InferredType::bool(), g, &guard.span, ConstraintOrigin::Condition);
                    }
                    let body = self.infer_expr(&arm.body);
                    self.constrain(result.clone(), body, &arm.body.span, ConstraintOrigin::Branch);
                    self.env.pop_scope();
                }
                result
            }
            ExprKind::Block(block) => self.infer_block(block),
            ExprKind::Lambda {
                params, ret, body, ..
            } => {
                self.env.push_scope();
                let mut param_tys = Vec::with_capacity(params.len());
                for param in params {
                    let ty = match &param.ty {
                        Some(ty) => self.resolve_type(ty),
                        None => self.fresh(),
                    };
                    self.env.bind(param.name.node.clone(), TypeScheme::mono(ty.clone()));
                    param_tys.push(ty);
                }
                let ret = match ret {
                    Some(ty) => self.resolve_type(ty),
                    None => self.fresh(),
                };
                // Effects performed in the body count against the enclosing
                // function.
                let frame = match self.fn_stack.last() {
                    Some(outer) => FnFrame {
                        ret: ret.clone(),
                        ..outer.clone()
                    },
                    None => FnFrame {
                        name: "<lambda>".to_string(),
                        ret: ret.clone(),
                        effects: Default::default(),
                        is_async: false,
                    },
                };
                self.fn_stack.push(frame);
                let loops = std::mem::take(&mut self.loops);

                let body_ty = self.infer_expr(body);
                self.constrain(ret.clone(), body_ty, &body.span, ConstraintOrigin::Return);

                self.loops = loops;
                self.fn_stack.pop();
                self.env.pop_scope();
                InferredType::function(param_tys, ret, EffectRow::Open)
            }
            ExprKind::Tuple(elems) => {
                let elems = elems.iter().map(|e| self.infer_expr(e)).collect();
                InferredType::tuple(elems)
            }
            ExprKind::Array(elems) => {
                let elem = self.fresh();
                for e in elems {
                    let t = self.infer_expr(e);
                    self.constrain(elem.clone(), t, &e.span, ConstraintOrigin::Element);
                }
                InferredType::generic(ARRAY, vec![elem])
            }
            ExprKind::Struct { name, fields, base } => self.infer_struct_literal(name, fields, base.as_deref(), span),
            ExprKind::Cast { expr: inner, ty } => {
                self.infer_expr(inner);
                self.resolve_type(ty)
            }
            ExprKind::Try(inner) => {
                let t = self.infer_expr(inner);
                let ok = self.fresh();
                let err = self.fresh();
                self.constrain(
                    InferredType::generic(RESULT, vec![ok.clone(), err]),
                    t,
                    &inner.span,
                    ConstraintOrigin::Try,
                );
                ok
            }
            ExprKind::Await(inner) => {
                let t = self.infer_expr(inner);
                let in_async = self.fn_stack.last().is_some_and(|f| f.is_async);
                if self.check_effects && !in_async {
                    self.error(
                        ErrorCategory::Effect,
                        "`await` is only allowed in async functions (declare `!Async`)",
                        span,
                    );
                }
                t
            }
            ExprKind::While { cond, body } => {
                let c = self.infer_expr(cond);
                self.constrain(InferredType::bool(), c, &cond.span, ConstraintOrigin::Condition);
                self.loops.push(LoopFrame { break_ty: None });
                self.infer_block(body);
                self.loops.pop();
                InferredType::unit()
            }
            ExprKind::Loop { body } => {
                let result = self.fresh();
                self.loops.push(LoopFrame {
                    break_ty: Some(result.clone()),
                });
                self.infer_block(body);
                self.loops.pop();
                result
            }
            ExprKind::For {
                pattern,
                iterable,
                body,
            } => {
                let iterable_ty = self.infer_expr(iterable);
                let elem = self.fresh();
                self.deferred.push(Deferred::Iter {
                    iterable: iterable_ty,
                    elem: elem.clone(),
                    span: iterable.span.clone(),
                });
                self.env.push_scope();
                self.check_pattern(pattern, &elem);
                self.loops.push(LoopFrame { break_ty: None });
                self.infer_block(body);
                self.loops.pop();
                self.env.pop_scope();
                InferredType::unit()
            }
            ExprKind::Range { start, end, .. } => {
                let bound = self.fresh();
                for e in start.iter().chain(end.iter()) {
                    let t = self.infer_expr(e);
                    self.constrain(bound.clone(), t, &e.span, ConstraintOrigin::Operand);
                }
                InferredType::generic(RANGE, vec![bound])
            }
        }
    }

    /// Calls synthesize the expected function type from the arguments and
    /// unify it with the callee, so a callee still being inferred works.
    fn infer_call(&mut self, callee: &Expr, args: &[Expr], span: &Span) -> InferredType {
        let callee_ty = self.infer_expr(callee);
        let arg_tys: Vec<InferredType> = args.iter().map(|a| self.infer_expr(a)).collect();

        if let (Some(name), InferredType::Function { params, ret, .. }) = (callee_name(callee), &callee_ty) {
            if params.len() != args.len() {
                self.error(
                    ErrorCategory::Type,
                    format!(
                        "function `{name}` expects {} argument(s), found {}",
                        params.len(),
                        args.len()
                    ),
                    span,
                );
                return (**ret).clone();
            }
        }

        let ret = self.fresh();
        let expected = InferredType::function(arg_tys, ret.clone(), EffectRow::Open);
        self.constrain(callee_ty.clone(), expected, span, ConstraintOrigin::Argument);
        self.record_effect_site(callee_ty, span);
        ret
    }

    fn infer_struct_literal(
        &mut self,
        name: &Ident,
        fields: &[FieldInit],
        base: Option<&Expr>,
        span: &Span,
    ) -> InferredType {
        let struct_name = self.struct_name(&name.node);
        let Some(def) = self.structs.get(&struct_name).cloned() else {
            self.error(ErrorCategory::Name, format!("unknown struct `{}`", name.node), &name.span);
            for init in fields {
                self.infer_expr(&init.value);
            }
            if let Some(base) = base {
                self.infer_expr(base);
            }
            return self.fresh();
        };

        let (ty, params) = self.instantiate_nominal(&struct_name, &def.generics);
        self.type_params.push(params);
        let mut seen = HashSet::new();
        for init in fields {
            let actual = self.infer_expr(&init.value);
            if !seen.insert(init.name.node.as_str()) {
                self.error(
                    ErrorCategory::Type,
                    format!("field `{}` specified more than once", init.name.node),
                    &init.span,
                );
                continue;
            }
            match def.fields.iter().find(|f| f.name.node == init.name.node) {
                Some(field) => {
                    let expected = self.resolve_type(&field.ty);
                    self.constrain(expected, actual, &init.value.span, ConstraintOrigin::Field);
                }
                None => self.error(
                    ErrorCategory::Name,
                    format!("struct `{struct_name}` has no field `{}`", init.name.node),
                    &init.name.span,
                ),
            }
        }
        self.type_params.pop();

        match base {
            Some(base) => {
                let base_ty = self.infer_expr(base);
                self.constrain(ty.clone(), base_ty, &base.span, ConstraintOrigin::Field);
            }
            None => {
                for field in &def.fields {
                    if !seen.contains(field.name.node.as_str()) {
                        self.error(
                            ErrorCategory::Type,
                            format!("missing field `{}` in initializer of `{struct_name}`", field.name.node),
                            span,
                        );
                    }
                }
            }
        }
        ty
    }

    /// `Self` names the impl target inside impl blocks.
    pub(super) fn struct_name(&self, name: &str) -> String {
        if name == "Self" {
            if let Some(n) = self.self_ty.as_ref().and_then(|t| t.nominal_name()) {
                return n.to_string();
            }
        }
        name.to_string()
    }

    pub(super) fn literal_type(&mut self, lit: &Literal, span: &Span) -> InferredType {
        let default = match lit.kind {
            LiteralKind::Int(_) => PrimitiveKind::I32,
            LiteralKind::Float(_) => PrimitiveKind::F64,
            LiteralKind::Str(_) => PrimitiveKind::Str,
            LiteralKind::Bool(_) => PrimitiveKind::Bool,
            LiteralKind::Char(_) => PrimitiveKind::Char,
            LiteralKind::Unit => return InferredType::unit(),
        };
        let Some(suffix) = &lit.suffix else {
            return InferredType::primitive(default);
        };
        let chosen = PrimitiveKind::from_name(suffix).filter(|p| match lit.kind {
            LiteralKind::Int(_) => p.is_integer() || p.is_float(),
            LiteralKind::Float(_) => p.is_float(),
            _ => false,
        });
        match chosen {
            Some(p) => InferredType::primitive(p),
            None => {
                self.error(
                    ErrorCategory::Type,
                    format!("invalid suffix `{suffix}` for {default} literal"),
                    span,
                );
                InferredType::primitive(default)
            }
        }
    }

    fn record_effect_site(&mut self, callee: InferredType, span: &Span) {
        if let Some(frame) = self.fn_stack.last() {
            let site = EffectSite {
                callee,
                caller: frame.name.clone(),
                declared: frame.effects.clone(),
                span: span.clone(),
            };
            self.effect_sites.push(site);
        }
    }
}

fn diverges(block: &Block) -> bool {
    matches!(
        block.stmts.last(),
        Some(Stmt::Return(_) | Stmt::Break(_) | Stmt::Continue(_))
    )
}

fn join_path<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments.collect::<Vec<_>>().join("::")
}

fn callee_name(callee: &Expr) -> Option<String> {
    match &callee.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Path(segments) => Some(join_path(segments.iter().map(|s| s.node.as_str()))),
        _ => None,
    }
}
