#![forbid(unsafe_code)]

//! Lowering type syntax to inferred types.

use std::collections::HashMap;

use veritas_ast::{GenericParam, PrimitiveKind, Span, TypeAlias, TypeExpr, TypeExprKind};

use super::TypeChecker;
use crate::error::ErrorCategory;
use crate::types::{ARRAY, EffectRow, InferredType};

impl TypeChecker {
    pub(super) fn resolve_type(&mut self, ty: &TypeExpr) -> InferredType {
        match &ty.kind {
            TypeExprKind::Primitive(p) => InferredType::primitive(*p),
            TypeExprKind::Tuple(elems) => {
                let elems = elems.iter().map(|e| self.resolve_type(e)).collect();
                InferredType::tuple(elems)
            }
            TypeExprKind::Array { elem, .. } => {
                let elem = self.resolve_type(elem);
                InferredType::generic(ARRAY, vec![elem])
            }
            // References are transparent to inference.
            TypeExprKind::Reference { inner, .. } => self.resolve_type(inner),
            TypeExprKind::Branded { base, brand } => {
                let base = self.resolve_type(base);
                InferredType::branded(brand.clone(), base)
            }
            TypeExprKind::Function {
                params,
                ret,
                effects,
            } => {
                let params = params.iter().map(|p| self.resolve_type(p)).collect();
                let ret = match ret {
                    Some(ret) => self.resolve_type(ret),
                    None => InferredType::unit(),
                };
                InferredType::function(
                    params,
                    ret,
                    EffectRow::closed(effects.iter().map(|e| e.kind)),
                )
            }
            TypeExprKind::Path { segments, args } => self.resolve_path_type(segments, args, &ty.span),
        }
    }

    fn lookup_type_param(&self, name: &str) -> Option<InferredType> {
        self.type_params
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    fn resolve_path_type(&mut self, segments: &[String], args: &[TypeExpr], span: &Span) -> InferredType {
        let name = segments.join("::");
        let args: Vec<InferredType> = args.iter().map(|a| self.resolve_type(a)).collect();

        if segments.len() == 1 {
            if let Some(param) = self.lookup_type_param(&name) {
                return param;
            }
            if name == "Self" {
                return match self.self_ty.clone() {
                    Some(ty) => ty,
                    None => {
                        self.error(
                            ErrorCategory::Name,
                            "`Self` is only available inside impl blocks and traits",
                            span,
                        );
                        self.fresh()
                    }
                };
            }
        }

        if let Some(alias) = self.aliases.get(&name).cloned() {
            return self.expand_alias(&alias, args, span);
        }
        let declared_arity = self
            .structs
            .get(&name)
            .map(|s| s.generics.len())
            .or_else(|| self.enums.get(&name).map(|e| e.generics.len()))
            .or_else(|| self.catalog.type_arity(&name));
        if let Some(arity) = declared_arity {
            return self.apply_nominal(&name, arity, args, span);
        }
        if let Some(ty) = self.catalog.alias(&name) {
            return ty.clone();
        }
        if self.opaque_types.contains(&name) || self.traits.contains_key(&name) {
            return if args.is_empty() {
                InferredType::named(name)
            } else {
                InferredType::generic(name, args)
            };
        }
        if let Some(p) = PrimitiveKind::from_name(&name) {
            return InferredType::primitive(p);
        }

        self.error(ErrorCategory::Name, format!("unknown type `{name}`"), span);
        self.fresh()
    }

    /// `Name` or `Name<args>`, with missing arguments inferred.
    fn apply_nominal(
        &mut self,
        name: &str,
        arity: usize,
        mut args: Vec<InferredType>,
        span: &Span,
    ) -> InferredType {
        if arity == 0 {
            if !args.is_empty() {
                self.error(
                    ErrorCategory::Type,
                    format!("type `{name}` takes no type arguments"),
                    span,
                );
            }
            return InferredType::named(name);
        }
        if !args.is_empty() && args.len() != arity {
            self.error(
                ErrorCategory::Type,
                format!(
                    "type `{name}` expects {arity} type argument(s), found {}",
                    args.len()
                ),
                span,
            );
            args.truncate(arity);
        }
        while args.len() < arity {
            args.push(self.fresh());
        }
        InferredType::generic(name, args)
    }

    fn expand_alias(&mut self, alias: &TypeAlias, args: Vec<InferredType>, span: &Span) -> InferredType {
        let name = alias.name.node.clone();
        if self.resolving_aliases.contains(&name) {
            self.error(
                ErrorCategory::Type,
                format!("type alias `{name}` refers to itself"),
                span,
            );
            return self.fresh();
        }
        if args.len() > alias.generics.len() {
            self.error(
                ErrorCategory::Type,
                format!(
                    "type alias `{name}` expects {} type argument(s), found {}",
                    alias.generics.len(),
                    args.len()
                ),
                span,
            );
        }

        let mut params = HashMap::new();
        let mut args = args.into_iter();
        for generic in &alias.generics {
            let arg = match args.next() {
                Some(arg) => arg,
                None => self.fresh(),
            };
            params.insert(generic.name.node.clone(), arg);
        }

        self.resolving_aliases.push(name);
        self.type_params.push(params);
        let ty = self.resolve_type(&alias.target);
        self.type_params.pop();
        self.resolving_aliases.pop();
        ty
    }

    /// The type of a fresh instance of a nominal type, plus the generic
    /// parameter mapping for resolving its member types.
    pub(super) fn instantiate_nominal(
        &mut self,
        name: &str,
        generics: &[GenericParam],
    ) -> (InferredType, HashMap<String, InferredType>) {
        if generics.is_empty() {
            return (InferredType::named(name), HashMap::new());
        }
        let params = self.generic_scope(generics);
        let ty = InferredType::generic(name, params.iter().map(|(_, t)| t.clone()).collect());
        (ty, params.into_iter().collect())
    }

    /// Generic parameter mapping for an already-known instance `ty`.
    pub(super) fn nominal_params(
        &mut self,
        generics: &[GenericParam],
        ty: &InferredType,
    ) -> HashMap<String, InferredType> {
        let args = match ty {
            InferredType::Generic { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        let mut args = args.into_iter();
        let mut params = HashMap::new();
        for generic in generics {
            let arg = match args.next() {
                Some(arg) => arg,
                None => self.fresh(),
            };
            params.insert(generic.name.node.clone(), arg);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::build::{alias, branded, branded_alias, generic_ty, program, ty};

    fn checker_with(items: Vec<veritas_ast::Item>) -> TypeChecker {
        let mut checker = TypeChecker::new();
        checker.check_program(&program(items));
        checker
    }

    #[test]
    fn branded_alias_resolves_to_brand() {
        let mut checker = checker_with(vec![branded_alias("UserId", ty("u64"))]);
        let resolved = checker.resolve_type(&ty("UserId"));
        assert_eq!(
            resolved,
            InferredType::branded("UserId", InferredType::primitive(PrimitiveKind::U64))
        );
        assert_eq!(checker.branded_types().get("UserId"), Some(&ty("u64")));
    }

    #[test]
    fn structural_alias_is_transparent() {
        let mut checker = checker_with(vec![alias("Count", ty("u32"))]);
        assert_eq!(
            checker.resolve_type(&ty("Count")),
            InferredType::primitive(PrimitiveKind::U32)
        );
        assert!(checker.branded_types().is_empty());
    }

    #[test]
    fn option_without_args_gets_fresh_argument() {
        let mut checker = checker_with(vec![]);
        match checker.resolve_type(&ty("Option")) {
            InferredType::Generic { name, args } => {
                assert_eq!(name, "Option");
                assert!(args[0].as_var().is_some());
            }
            other => panic!("unexpected {other}"),
        }
        let concrete = checker.resolve_type(&generic_ty("Option", vec![ty("bool")]));
        assert_eq!(concrete.to_string(), "Option<bool>");
    }

    #[test]
    fn self_referential_alias_is_an_error() {
        let mut checker = checker_with(vec![alias("Loop", ty("Loop"))]);
        checker.resolve_type(&ty("Loop"));
        assert!(checker.errors().iter().any(|e| e.message.contains("refers to itself")));
    }

    #[test]
    fn unknown_type_is_a_name_error() {
        let mut checker = checker_with(vec![]);
        checker.resolve_type(&branded(ty("Nope"), "Brand"));
        assert_eq!(checker.errors().len(), 1);
        assert_eq!(checker.errors()[0].category, ErrorCategory::Name);
    }
}
