#![forbid(unsafe_code)]

//! Constraints and the Robinson unification solver.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::trace;
use veritas_ast::Span;

use crate::error::ErrorCategory;
use crate::types::{EffectRow, InferredType, TypeVar};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    Equality,
    /// Solved as equality; there is no subtyping beyond identity.
    Subtype,
}

/// Why a constraint was generated. Selects the wording of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintOrigin {
    Argument,
    Return,
    Annotation,
    Branch,
    Condition,
    Operand,
    Pattern,
    Assignment,
    Element,
    Field,
    Try,
    Contract,
    Iteration,
    Member,
}

impl ConstraintOrigin {
    fn noun(&self) -> &'static str {
        match self {
            ConstraintOrigin::Argument => "argument type",
            ConstraintOrigin::Return => "return type",
            ConstraintOrigin::Annotation => "annotated type",
            ConstraintOrigin::Branch => "branch type",
            ConstraintOrigin::Condition => "condition type",
            ConstraintOrigin::Operand => "operand type",
            ConstraintOrigin::Pattern => "pattern type",
            ConstraintOrigin::Assignment => "assignment type",
            ConstraintOrigin::Element => "element type",
            ConstraintOrigin::Field => "field type",
            ConstraintOrigin::Try => "`?` operand type",
            ConstraintOrigin::Contract => "contract type",
            ConstraintOrigin::Iteration => "iterator type",
            ConstraintOrigin::Member => "member type",
        }
    }
}

/// `expected ≡ actual`, attributed to the span that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub expected: InferredType,
    pub actual: InferredType,
    pub span: Span,
    pub origin: ConstraintOrigin,
}

impl Constraint {
    pub fn equal(
        expected: InferredType,
        actual: InferredType,
        span: Span,
        origin: ConstraintOrigin,
    ) -> Self {
        Self {
            kind: ConstraintKind::Equality,
            expected,
            actual,
            span,
            origin,
        }
    }

    pub fn subtype(
        expected: InferredType,
        actual: InferredType,
        span: Span,
        origin: ConstraintOrigin,
    ) -> Self {
        Self {
            kind: ConstraintKind::Subtype,
            ..Self::equal(expected, actual, span, origin)
        }
    }
}

/// Variable bindings produced by the solver. Bindings may refer to other
/// bound variables; `apply` chases them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    map: BTreeMap<TypeVar, InferredType>,
}

impl Substitution {
    pub fn insert(&mut self, var: TypeVar, ty: InferredType) {
        self.map.insert(var, ty);
    }

    pub fn get(&self, var: TypeVar) -> Option<&InferredType> {
        self.map.get(&var)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVar, &InferredType)> {
        self.map.iter()
    }

    pub fn apply(&self, ty: &InferredType) -> InferredType {
        match ty {
            InferredType::Var(v) => match self.map.get(v) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            InferredType::Concrete(_) => ty.clone(),
            InferredType::Function {
                params,
                ret,
                effects,
            } => InferredType::Function {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
                effects: effects.clone(),
            },
            InferredType::Generic { name, args } => InferredType::Generic {
                name: name.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            InferredType::Branded { brand, base } => InferredType::Branded {
                brand: brand.clone(),
                base: Box::new(self.apply(base)),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum UnifyErrorKind {
    #[error("expected `{expected}`, found `{found}`")]
    Mismatch {
        expected: InferredType,
        found: InferredType,
    },
    #[error("expected brand `{expected}`, found `{found}`")]
    BrandMismatch { expected: String, found: String },
    #[error("infinite type: `{var}` occurs in `{ty}`")]
    Occurs { var: TypeVar, ty: InferredType },
    #[error("expected {expected} parameters, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("`{name}` expects {expected} type arguments, found {found}")]
    GenericArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("expected effects `{expected}`, found `{found}`")]
    EffectMismatch { expected: String, found: String },
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind}")]
pub struct UnificationError {
    pub kind: UnifyErrorKind,
    pub span: Span,
    pub origin: ConstraintOrigin,
}

impl UnificationError {
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            UnifyErrorKind::EffectMismatch { .. } => ErrorCategory::Effect,
            _ => ErrorCategory::Type,
        }
    }

    /// Human wording, phrased by what produced the failing constraint.
    pub fn message(&self) -> String {
        match &self.kind {
            UnifyErrorKind::Mismatch { .. } => format!("{} mismatch: {}", self.origin.noun(), self.kind),
            UnifyErrorKind::BrandMismatch { .. } => format!("branded type mismatch: {}", self.kind),
            UnifyErrorKind::Occurs { .. } => self.kind.to_string(),
            UnifyErrorKind::Arity { .. } => format!("function arity mismatch: {}", self.kind),
            UnifyErrorKind::GenericArity { .. } => format!("type argument mismatch: {}", self.kind),
            UnifyErrorKind::EffectMismatch { .. } => {
                format!("incompatible effect annotation: {}", self.kind)
            }
        }
    }
}

struct EffectSet<'a>(&'a EffectRow);

impl fmt::Display for EffectSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            EffectRow::Closed(set) if set.is_empty() => f.write_str("pure"),
            row => write!(f, "{}", row.to_string().trim_start()),
        }
    }
}

/// Incremental solver: constraints appended to a list are consumed in order,
/// and the substitution keeps growing. The first failure is sticky.
#[derive(Clone, Debug, Default)]
pub struct Solver {
    subst: Substitution,
    consumed: usize,
    failure: Option<UnificationError>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn substitution(&self) -> &Substitution {
        &self.subst
    }

    pub fn into_substitution(self) -> Substitution {
        self.subst
    }

    pub fn failure(&self) -> Option<&UnificationError> {
        self.failure.as_ref()
    }

    pub fn apply(&self, ty: &InferredType) -> InferredType {
        self.subst.apply(ty)
    }

    /// Solve every constraint in `constraints` not yet seen by this solver.
    pub fn solve_pending(&mut self, constraints: &[Constraint]) -> Result<(), UnificationError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let pending = constraints.get(self.consumed..).unwrap_or_default();
        for constraint in pending {
            self.consumed += 1;
            if let Err(kind) = self.unify(&constraint.expected, &constraint.actual) {
                let err = UnificationError {
                    kind,
                    span: constraint.span.clone(),
                    origin: constraint.origin,
                };
                self.failure = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    fn unify(&mut self, a: &InferredType, b: &InferredType) -> Result<(), UnifyErrorKind> {
        let a = self.subst.apply(a);
        let b = self.subst.apply(b);
        trace!(%a, %b, "unify");

        match (&a, &b) {
            (InferredType::Var(x), InferredType::Var(y)) if x == y => Ok(()),
            (InferredType::Var(x), other) | (other, InferredType::Var(x)) => self.bind(*x, other),
            (InferredType::Concrete(x), InferredType::Concrete(y)) if x == y => Ok(()),
            (
                InferredType::Function {
                    params: p1,
                    ret: r1,
                    effects: e1,
                },
                InferredType::Function {
                    params: p2,
                    ret: r2,
                    effects: e2,
                },
            ) => {
                if p1.len() != p2.len() {
                    return Err(UnifyErrorKind::Arity {
                        expected: p1.len(),
                        found: p2.len(),
                    });
                }
                for (x, y) in p1.iter().zip(p2) {
                    self.unify(x, y)?;
                }
                self.unify(r1, r2)?;
                unify_effects(e1, e2)
            }
            (InferredType::Generic { name: n1, args: a1 }, InferredType::Generic { name: n2, args: a2 })
                if n1 == n2 =>
            {
                if a1.len() != a2.len() {
                    return Err(UnifyErrorKind::GenericArity {
                        name: n1.clone(),
                        expected: a1.len(),
                        found: a2.len(),
                    });
                }
                for (x, y) in a1.iter().zip(a2) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (
                InferredType::Branded {
                    brand: b1,
                    base: base1,
                },
                InferredType::Branded {
                    brand: b2,
                    base: base2,
                },
            ) => {
                if b1 != b2 {
                    return Err(UnifyErrorKind::BrandMismatch {
                        expected: b1.clone(),
                        found: b2.clone(),
                    });
                }
                self.unify(base1, base2)
            }
            _ => Err(UnifyErrorKind::Mismatch {
                expected: a.clone(),
                found: b.clone(),
            }),
        }
    }

    fn bind(&mut self, var: TypeVar, ty: &InferredType) -> Result<(), UnifyErrorKind> {
        if ty.occurs(var) {
            return Err(UnifyErrorKind::Occurs {
                var,
                ty: ty.clone(),
            });
        }
        trace!(%var, %ty, "bind");
        self.subst.insert(var, ty.clone());
        Ok(())
    }
}

fn unify_effects(expected: &EffectRow, found: &EffectRow) -> Result<(), UnifyErrorKind> {
    match (expected, found) {
        (EffectRow::Open, _) | (_, EffectRow::Open) => Ok(()),
        (EffectRow::Closed(a), EffectRow::Closed(b)) if a == b => Ok(()),
        _ => Err(UnifyErrorKind::EffectMismatch {
            expected: EffectSet(expected).to_string(),
            found: EffectSet(found).to_string(),
        }),
    }
}

/// Solve `constraints` from scratch, stopping at the first failure.
pub fn solve(constraints: &[Constraint]) -> Result<Substitution, UnificationError> {
    let mut solver = Solver::new();
    solver.solve_pending(constraints)?;
    Ok(solver.into_substitution())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ARRAY, OPTION};
    use veritas_ast::{EffectKind, PrimitiveKind};

    fn var(n: u32) -> InferredType {
        InferredType::Var(TypeVar(n))
    }

    fn i32_() -> InferredType {
        InferredType::primitive(PrimitiveKind::I32)
    }

    fn eq(a: InferredType, b: InferredType) -> Constraint {
        Constraint::equal(a, b, Span::dummy(), ConstraintOrigin::Argument)
    }

    #[test]
    fn chains_resolve_through_substitution() {
        let subst = solve(&[eq(var(0), var(1)), eq(var(1), i32_())]).unwrap();
        assert_eq!(subst.apply(&var(0)), i32_());
        assert_eq!(subst.apply(&var(1)), i32_());
    }

    #[test]
    fn occurs_check_rejects_cyclic_binding() {
        let err = solve(&[eq(var(0), InferredType::generic(ARRAY, vec![var(0)]))]).unwrap_err();
        assert!(matches!(err.kind, UnifyErrorKind::Occurs { .. }));
    }

    #[test]
    fn occurs_check_through_indirection() {
        let err = solve(&[
            eq(var(1), InferredType::generic(OPTION, vec![var(0)])),
            eq(var(0), var(1)),
        ])
        .unwrap_err();
        assert!(matches!(err.kind, UnifyErrorKind::Occurs { .. }));
    }

    #[test]
    fn brands_are_nominal() {
        let u64_ = InferredType::primitive(PrimitiveKind::U64);
        let err = solve(&[eq(
            InferredType::branded("UserId", u64_.clone()),
            InferredType::branded("OrderId", u64_.clone()),
        )])
        .unwrap_err();
        assert_eq!(
            err.kind,
            UnifyErrorKind::BrandMismatch {
                expected: "UserId".into(),
                found: "OrderId".into()
            }
        );
        assert!(err.message().contains("branded type mismatch"));

        let err = solve(&[eq(InferredType::branded("UserId", u64_.clone()), u64_)]).unwrap_err();
        assert!(matches!(err.kind, UnifyErrorKind::Mismatch { .. }));
    }

    #[test]
    fn closed_effects_need_equal_sets() {
        let f = |effects| InferredType::function(vec![], InferredType::unit(), effects);
        let io_state = EffectRow::closed([EffectKind::State, EffectKind::IO]);
        let state_io = EffectRow::closed([EffectKind::IO, EffectKind::State]);
        assert!(solve(&[eq(f(io_state.clone()), f(state_io))]).is_ok());

        let err = solve(&[eq(f(EffectRow::closed([EffectKind::IO])), f(EffectRow::pure()))]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Effect);
        assert_eq!(
            err.kind,
            UnifyErrorKind::EffectMismatch {
                expected: "!IO".into(),
                found: "pure".into()
            }
        );

        assert!(solve(&[eq(f(io_state), f(EffectRow::Open))]).is_ok());
    }

    #[test]
    fn function_arity_is_checked() {
        let a = InferredType::function(vec![i32_()], i32_(), EffectRow::pure());
        let b = InferredType::function(vec![i32_(), i32_()], i32_(), EffectRow::pure());
        let err = solve(&[eq(a, b)]).unwrap_err();
        assert_eq!(err.kind, UnifyErrorKind::Arity { expected: 1, found: 2 });
    }

    #[test]
    fn return_origin_shapes_message() {
        let c = Constraint::equal(i32_(), InferredType::bool(), Span::at(4, 2, 1), ConstraintOrigin::Return);
        let err = solve(&[c]).unwrap_err();
        assert_eq!(err.message(), "return type mismatch: expected `i32`, found `bool`");
        assert_eq!(err.span, Span::at(4, 2, 1));
    }

    #[test]
    fn incremental_solver_is_sticky_after_failure() {
        let mut constraints = vec![eq(var(0), i32_())];
        let mut solver = Solver::new();
        solver.solve_pending(&constraints).unwrap();
        assert_eq!(solver.apply(&var(0)), i32_());

        constraints.push(eq(var(0), InferredType::bool()));
        assert!(solver.solve_pending(&constraints).is_err());
        constraints.push(eq(var(5), i32_()));
        assert!(solver.solve_pending(&constraints).is_err());
        assert!(solver.failure().is_some());
        assert_eq!(solver.apply(&var(5)), var(5));
    }
}
