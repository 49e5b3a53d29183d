#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashSet};

use veritas_ast::{FieldPattern, Literal, Pattern, Span};

use super::TypeChecker;
use crate::constraints::ConstraintOrigin;
use crate::error::ErrorCategory;
use crate::types::{InferredType, TypeScheme};

impl TypeChecker {
    /// Check `pattern` against `expected` and bind its names, monomorphic,
    /// in the innermost scope.
    pub(super) fn check_pattern(&mut self, pattern: &Pattern, expected: &InferredType) {
        match pattern {
            Pattern::Wildcard { .. } => {}
            Pattern::Ident { span, name, .. } => {
                // A bare `None` names the constructor, not a fresh binding.
                if let Some(ctor) = self.value_constructor(name) {
                    let ty = self.instantiate(&ctor);
                    self.constrain(expected.clone(), ty, span, ConstraintOrigin::Pattern);
                } else {
                    self.env.bind(name.clone(), TypeScheme::mono(expected.clone()));
                }
            }
            Pattern::Literal { span, value } => {
                let ty = self.literal_type(value, span);
                self.constrain(expected.clone(), ty, span, ConstraintOrigin::Pattern);
            }
            Pattern::Range { span, start, end, .. } => {
                let bounds: Vec<&Literal> = start.iter().chain(end.iter()).collect();
                for lit in bounds {
                    let ty = self.literal_type(lit, span);
                    self.constrain(expected.clone(), ty, span, ConstraintOrigin::Pattern);
                }
            }
            Pattern::Tuple { span, elems } => {
                let elem_tys: Vec<InferredType> = elems.iter().map(|_| self.fresh()).collect();
                self.constrain(
                    expected.clone(),
                    InferredType::tuple(elem_tys.clone()),
                    span,
                    ConstraintOrigin::Pattern,
                );
                for (elem, ty) in elems.iter().zip(&elem_tys) {
                    self.check_pattern(elem, ty);
                }
            }
            Pattern::Struct {
                span,
                name,
                fields,
                rest,
            } => {
                let struct_name = self.struct_name(&name.node);
                let Some(def) = self.structs.get(&struct_name).cloned() else {
                    self.error(ErrorCategory::Name, format!("unknown struct `{}`", name.node), &name.span);
                    for field in fields {
                        let ty = self.fresh();
                        self.bind_field_pattern(field, &ty);
                    }
                    return;
                };

                let (ty, params) = self.instantiate_nominal(&struct_name, &def.generics);
                self.constrain(expected.clone(), ty, span, ConstraintOrigin::Pattern);
                self.type_params.push(params);
                for field in fields {
                    let field_ty = match def.fields.iter().find(|f| f.name.node == field.name.node) {
                        Some(decl) => self.resolve_type(&decl.ty),
                        None => {
                            self.error(
                                ErrorCategory::Name,
                                format!("struct `{struct_name}` has no field `{}`", field.name.node),
                                &field.name.span,
                            );
                            self.fresh()
                        }
                    };
                    self.bind_field_pattern(field, &field_ty);
                }
                self.type_params.pop();

                if !rest {
                    let mentioned: HashSet<&str> = fields.iter().map(|f| f.name.node.as_str()).collect();
                    let missing: Vec<&str> = def
                        .fields
                        .iter()
                        .map(|f| f.name.node.as_str())
                        .filter(|n| !mentioned.contains(n))
                        .collect();
                    if !missing.is_empty() {
                        self.error(
                            ErrorCategory::Type,
                            format!(
                                "pattern does not mention field(s) {} of `{struct_name}`",
                                missing.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(", ")
                            ),
                            span,
                        );
                    }
                }
            }
            Pattern::Enum { span, path, fields } => {
                let name = path.iter().map(|s| s.node.as_str()).collect::<Vec<_>>().join("::");
                let Some(ctor) = self.constructors.get(&name).cloned() else {
                    self.error(ErrorCategory::Name, format!("unknown variant `{name}`"), span);
                    for field in fields {
                        let ty = self.fresh();
                        self.check_pattern(field, &ty);
                    }
                    return;
                };
                match self.instantiate(&ctor) {
                    InferredType::Function { params, ret, .. } => {
                        self.constrain(expected.clone(), *ret, span, ConstraintOrigin::Pattern);
                        if params.len() != fields.len() {
                            self.error(
                                ErrorCategory::Type,
                                format!(
                                    "variant `{name}` has {} field(s), pattern has {}",
                                    params.len(),
                                    fields.len()
                                ),
                                span,
                            );
                        }
                        for (field, ty) in fields.iter().zip(&params) {
                            self.check_pattern(field, ty);
                        }
                    }
                    value => {
                        self.constrain(expected.clone(), value, span, ConstraintOrigin::Pattern);
                        if !fields.is_empty() {
                            self.error(
                                ErrorCategory::Type,
                                format!("variant `{name}` has no fields"),
                                span,
                            );
                        }
                    }
                }
            }
            Pattern::Or { span, alternatives } => self.check_or_pattern(alternatives, expected, span),
        }
    }

    fn bind_field_pattern(&mut self, field: &FieldPattern, ty: &InferredType) {
        match &field.pattern {
            Some(p) => self.check_pattern(p, ty),
            None => self.env.bind(field.name.node.clone(), TypeScheme::mono(ty.clone())),
        }
    }

    /// Every alternative must bind the same names at the same types; the
    /// first alternative's bindings become visible.
    fn check_or_pattern(&mut self, alternatives: &[Pattern], expected: &InferredType, span: &Span) {
        let mut first: Option<BTreeMap<String, InferredType>> = None;
        for alt in alternatives {
            self.env.push_scope();
            self.check_pattern(alt, expected);
            let scope = self.env.pop_scope().unwrap_or_default();
            let bound: BTreeMap<String, InferredType> =
                scope.into_iter().map(|(name, scheme)| (name, scheme.body)).collect();

            let Some(reference) = first.as_ref() else {
                first = Some(bound);
                continue;
            };
            if !reference.keys().eq(bound.keys()) {
                self.error(
                    ErrorCategory::Type,
                    "or-pattern alternatives must bind the same names",
                    alt.span(),
                );
                continue;
            }
            let pairs: Vec<(InferredType, InferredType)> =
                reference.values().cloned().zip(bound.into_values()).collect();
            for (a, b) in pairs {
                self.constrain(a, b, span, ConstraintOrigin::Pattern);
            }
        }
        for (name, ty) in first.unwrap_or_default() {
            self.env.bind(name, TypeScheme::mono(ty));
        }
    }

    /// Constructors that are values rather than functions (`None`).
    fn value_constructor(&self, name: &str) -> Option<TypeScheme> {
        if !name.starts_with(char::is_uppercase) {
            return None;
        }
        self.constructors
            .get(name)
            .filter(|scheme| !matches!(scheme.body, InferredType::Function { .. }))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::build::*;
    use veritas_ast::Item;

    fn check(items: Vec<Item>) -> TypeChecker {
        let mut checker = TypeChecker::new();
        checker.check_program(&program(items));
        checker
    }

    fn point() -> Item {
        struct_def("Point", &[], vec![("x", ty("i32")), ("y", ty("i32"))])
    }

    #[test]
    fn struct_pattern_binds_field_types() {
        let checker = check(vec![
            point(),
            func("sum")
                .param("p", ty("Point"))
                .returns(ty("i32"))
                .body(block(
                    vec![let_pat(pat_struct("Point", &["x", "y"]), ident("p"))],
                    Some(add(ident("x"), ident("y"))),
                ))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn struct_pattern_must_mention_every_field() {
        let checker = check(vec![
            point(),
            func("first")
                .param("p", ty("Point"))
                .returns(ty("i32"))
                .body(block(
                    vec![let_pat(pat_struct("Point", &["x"]), ident("p"))],
                    Some(ident("x")),
                ))
                .item(),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert!(checker.errors()[0].message.contains("`y`"));
    }

    #[test]
    fn option_patterns_bind_payload() {
        let checker = check(vec![
            func("get")
                .param("o", generic_ty("Option", vec![ty("i32")]))
                .returns(ty("i32"))
                .body(block(
                    vec![],
                    Some(match_(
                        ident("o"),
                        vec![
                            arm(pat_enum(&["Some"], vec![pat_ident("v")]), ident("v")),
                            arm(pat_ident("None"), int(0)),
                        ],
                    )),
                ))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn or_pattern_alternatives_bind_same_names() {
        let pattern = pat_or(vec![
            pat_enum(&["Some"], vec![pat_ident("a")]),
            pat_enum(&["Some"], vec![pat_ident("b")]),
        ]);
        let mut checker = check(vec![]);
        checker.check_pattern(
            &pattern,
            &InferredType::generic("Option", vec![InferredType::bool()]),
        );
        assert_eq!(checker.errors().len(), 1);
        assert!(checker.errors()[0].message.contains("bind the same names"));
    }

    #[test]
    fn variant_field_count_is_checked() {
        let checker = check(vec![
            func("f")
                .param("o", generic_ty("Option", vec![ty("i32")]))
                .body(block(
                    vec![expr_stmt(match_(
                        ident("o"),
                        vec![
                            arm(pat_enum(&["Some"], vec![pat_ident("a"), pat_ident("b")]), unit()),
                            arm(pat_wild(), unit()),
                        ],
                    ))],
                    None,
                ))
                .item(),
        ]);
        assert!(checker.errors().iter().any(|e| e.message.contains("has 1 field(s)")));
    }
}
