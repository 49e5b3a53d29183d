#![forbid(unsafe_code)]

//! Member access whose meaning depends on the receiver's solved type.
//!
//! Field projections, method calls and `for` iteration cannot be typed while
//! the receiver is still a variable, so the walk records them here. After the
//! main solve they are resolved in a fixpoint: each round resolves every item
//! whose receiver became known, feeding new constraints back to the solver.
//! Items still unknown when a round makes no progress are ambiguous.

use std::collections::BTreeSet;

use tracing::trace;
use veritas_ast::{EffectKind, PrimitiveKind, Span};

use super::TypeChecker;
use crate::constraints::{ConstraintOrigin, UnificationError};
use crate::error::ErrorCategory;
use crate::types::{ARRAY, EffectRow, InferredType, RANGE, TUPLE};

#[derive(Clone, Debug)]
pub(super) struct MemberCall {
    pub(super) receiver: InferredType,
    pub(super) method: String,
    pub(super) args: Vec<InferredType>,
    pub(super) ret: InferredType,
    /// Enclosing function and its declared effects.
    pub(super) caller: Option<(String, BTreeSet<EffectKind>)>,
    pub(super) span: Span,
}

#[derive(Clone, Debug)]
pub(super) enum Deferred {
    Field {
        base: InferredType,
        field: String,
        result: InferredType,
        span: Span,
    },
    Method(MemberCall),
    Iter {
        iterable: InferredType,
        elem: InferredType,
        span: Span,
    },
}

impl Deferred {
    /// Types this item will constrain once resolved.
    pub(super) fn types(&self) -> Vec<&InferredType> {
        match self {
            Deferred::Field { base, result, .. } => vec![base, result],
            Deferred::Method(call) => {
                let mut out = vec![&call.receiver, &call.ret];
                out.extend(&call.args);
                out
            }
            Deferred::Iter { iterable, elem, .. } => vec![iterable, elem],
        }
    }

    fn receiver(&self) -> &InferredType {
        match self {
            Deferred::Field { base, .. } => base,
            Deferred::Method(call) => &call.receiver,
            Deferred::Iter { iterable, .. } => iterable,
        }
    }
}

/// A call whose callee effects are compared with the caller's declaration
/// once the callee type is solved.
#[derive(Clone, Debug)]
pub(super) struct EffectSite {
    pub(super) callee: InferredType,
    pub(super) caller: String,
    pub(super) declared: BTreeSet<EffectKind>,
    pub(super) span: Span,
}

impl TypeChecker {
    pub(super) fn resolve_deferred(&mut self) -> Result<(), UnificationError> {
        let mut pending = std::mem::take(&mut self.deferred);
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for item in pending {
                self.solver.solve_pending(&self.constraints)?;
                let receiver = self.solver.apply(item.receiver());
                if receiver.as_var().is_some() {
                    waiting.push(item);
                    continue;
                }
                self.resolve_member(item, receiver);
            }
            self.solver.solve_pending(&self.constraints)?;
            if waiting.len() == before {
                for item in waiting {
                    self.report_ambiguous(item)?;
                }
                break;
            }
            pending = waiting;
        }
        Ok(())
    }

    fn resolve_member(&mut self, item: Deferred, receiver: InferredType) {
        trace!(receiver = %receiver, "resolving member access");
        match item {
            Deferred::Field {
                field,
                result,
                span,
                ..
            } => self.resolve_field(&receiver, &field, result, &span),
            Deferred::Method(call) => self.resolve_method(&receiver, call),
            Deferred::Iter { elem, span, .. } => self.resolve_iter(&receiver, elem, &span),
        }
    }

    fn resolve_field(&mut self, base: &InferredType, field: &str, result: InferredType, span: &Span) {
        let base = match base {
            InferredType::Branded { base, .. } => base.as_ref(),
            other => other,
        };
        if let InferredType::Generic { name, args } = base {
            if name == TUPLE {
                match field.parse::<usize>().ok().and_then(|i| args.get(i)) {
                    Some(elem) => self.constrain(elem.clone(), result, span, ConstraintOrigin::Field),
                    None => self.error(
                        ErrorCategory::Name,
                        format!("no field `{field}` on tuple `{base}`"),
                        span,
                    ),
                }
                return;
            }
        }

        let def = base.nominal_name().and_then(|n| self.structs.get(n)).cloned();
        let Some(def) = def else {
            self.error(ErrorCategory::Name, format!("no field `{field}` on type `{base}`"), span);
            return;
        };
        let Some(decl) = def.fields.iter().find(|f| f.name.node == field) else {
            self.error(
                ErrorCategory::Name,
                format!("struct `{}` has no field `{field}`", def.name.node),
                span,
            );
            return;
        };
        let params = self.nominal_params(&def.generics, base);
        self.type_params.push(params);
        let field_ty = self.resolve_type(&decl.ty);
        self.type_params.pop();
        self.constrain(field_ty, result, span, ConstraintOrigin::Field);
    }

    fn resolve_method(&mut self, receiver: &InferredType, call: MemberCall) {
        let Some(type_name) = receiver.nominal_name().map(str::to_string) else {
            self.error(
                ErrorCategory::Name,
                format!("no method `{}` on type `{receiver}`", call.method),
                &call.span,
            );
            return;
        };
        let key = (type_name.clone(), call.method.clone());
        let Some(scheme) = self.methods.get(&key).cloned() else {
            self.error(
                ErrorCategory::Name,
                format!("no method `{}` on type `{type_name}`", call.method),
                &call.span,
            );
            return;
        };

        let signature = self.instantiate(&scheme);
        if let InferredType::Function { params, ret, .. } = &signature {
            // The receiver is the first parameter.
            let expected_args = params.len().saturating_sub(1);
            if expected_args != call.args.len() {
                self.error(
                    ErrorCategory::Type,
                    format!(
                        "method `{type_name}::{}` expects {expected_args} argument(s), found {}",
                        call.method,
                        call.args.len()
                    ),
                    &call.span,
                );
                self.constrain((**ret).clone(), call.ret, &call.span, ConstraintOrigin::Member);
                return;
            }
        }

        let mut params = Vec::with_capacity(call.args.len() + 1);
        params.push(receiver.clone());
        params.extend(call.args);
        let actual = InferredType::function(params, call.ret, EffectRow::Open);
        self.constrain(signature.clone(), actual, &call.span, ConstraintOrigin::Member);

        if let Some((caller, declared)) = call.caller {
            self.effect_sites.push(EffectSite {
                callee: signature,
                caller,
                declared,
                span: call.span,
            });
        }
    }

    fn resolve_iter(&mut self, iterable: &InferredType, elem: InferredType, span: &Span) {
        match iterable {
            InferredType::Generic { name, args } if (name == ARRAY || name == RANGE) && args.len() == 1 => {
                self.constrain(args[0].clone(), elem, span, ConstraintOrigin::Iteration);
            }
            ty if *ty == InferredType::primitive(PrimitiveKind::Str) => {
                let ch = InferredType::primitive(PrimitiveKind::Char);
                self.constrain(ch, elem, span, ConstraintOrigin::Iteration);
            }
            other => self.error(ErrorCategory::Type, format!("`{other}` is not iterable"), span),
        }
    }

    /// Field and method receivers must be known; an unknown iterable is taken
    /// to be an array.
    fn report_ambiguous(&mut self, item: Deferred) -> Result<(), UnificationError> {
        match item {
            Deferred::Iter { iterable, elem, span } => {
                let array = InferredType::generic(ARRAY, vec![elem]);
                self.constrain(array, iterable, &span, ConstraintOrigin::Iteration);
                self.solver.solve_pending(&self.constraints)?;
            }
            Deferred::Field { field, span, .. } => self.error(
                ErrorCategory::Type,
                format!("ambiguous inference: cannot determine the type whose field `{field}` is accessed"),
                &span,
            ),
            Deferred::Method(call) => self.error(
                ErrorCategory::Type,
                format!(
                    "ambiguous inference: cannot determine the receiver type of method `{}`",
                    call.method
                ),
                &call.span,
            ),
        }
        Ok(())
    }

    /// Report calls whose solved callee performs effects the caller does not
    /// declare. Open rows (unknown callees) impose nothing.
    pub(super) fn check_effect_sites(&mut self) {
        let sites = std::mem::take(&mut self.effect_sites);
        let mut reported = BTreeSet::new();
        for site in sites {
            let callee = self.solver.apply(&site.callee);
            let InferredType::Function {
                effects: EffectRow::Closed(performed),
                ..
            } = callee
            else {
                continue;
            };
            let missing: Vec<EffectKind> = performed.difference(&site.declared).copied().collect();
            for effect in missing {
                if !reported.insert((site.caller.clone(), effect)) {
                    continue;
                }
                self.error(
                    ErrorCategory::Effect,
                    format!(
                        "missing effect annotation: `{}` performs `{effect}` but does not declare it",
                        site.caller
                    ),
                    &site.span,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::Item;
    use veritas_ast::build::*;

    fn check(items: Vec<Item>) -> TypeChecker {
        let mut checker = TypeChecker::new();
        checker.check_program(&program(items));
        checker
    }

    #[test]
    fn generic_struct_field_is_instantiated() {
        let checker = check(vec![
            struct_def("Boxed", &["T"], vec![("value", ty("T"))]),
            func("open")
                .returns(ty("bool"))
                .body(block(
                    vec![let_("b", struct_lit("Boxed", vec![("value", boolean(true))]))],
                    Some(field(ident("b"), "value")),
                ))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn tuple_fields_are_indexed() {
        let checker = check(vec![
            func("second")
                .returns(ty("bool"))
                .body(block(
                    vec![let_("t", tuple(vec![int(1), boolean(false)]))],
                    Some(field(ident("t"), "1")),
                ))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn unknown_method_is_a_name_error() {
        let checker = check(vec![
            func("f")
                .param("s", ty("str"))
                .body(block(vec![expr_stmt(method(ident("s"), "shout", vec![]))], None))
                .item(),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert_eq!(checker.errors()[0].category, ErrorCategory::Name);
    }

    #[test]
    fn field_on_unconstrained_lambda_parameter_is_ambiguous() {
        let checker = check(vec![
            func("f")
                .body(block(vec![let_("g", lambda(&["x"], field(ident("x"), "size")))], None))
                .item(),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert!(checker.errors()[0].message.starts_with("ambiguous inference"));
    }

    #[test]
    fn for_loop_binds_array_elements() {
        let checker = check(vec![
            func("total")
                .returns(ty("i64"))
                .body(block(
                    vec![
                        let_("sum", int_suffixed(0, "i64")),
                        expr_stmt(for_(
                            pat_ident("n"),
                            array(vec![int(1), int(2)]),
                            block(vec![expr_stmt(add(ident("sum"), ident("n")))], None),
                        )),
                    ],
                    Some(ident("sum")),
                ))
                .item(),
        ]);
        // `1` and `2` default to i32, so adding them to an i64 fails.
        assert_eq!(checker.errors().len(), 1);
    }

    #[test]
    fn method_effects_count_against_the_caller() {
        let push = |declared: bool| {
            let f = func("fill")
                .param("xs", array_ty(ty("i32")))
                .body(block(vec![expr_stmt(method(ident("xs"), "push", vec![int(1)]))], None));
            if declared { f.effect(veritas_ast::EffectKind::State) } else { f }
        };
        let missing = check(vec![push(false).item()]);
        assert_eq!(missing.errors().len(), 1);
        assert_eq!(missing.errors()[0].category, ErrorCategory::Effect);

        let declared = check(vec![push(true).item()]);
        assert!(declared.errors().is_empty(), "{:?}", declared.errors());
    }
}
