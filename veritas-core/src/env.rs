#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashMap};

use crate::constraints::Substitution;
use crate::types::{InferredType, TypeScheme, TypeVar};

pub type Scope = HashMap<String, TypeScheme>;

/// Name → scheme bindings as a stack of lexical scopes.
///
/// The bottom scope holds item-level bindings; every block, lambda, match arm
/// and function body pushes a child scope on top.
#[derive(Clone, Debug)]
pub struct TypeEnv {
    scopes: Vec<Scope>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Drop the innermost scope and hand back its bindings. The root scope is
    /// never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind in the innermost scope, shadowing outer bindings.
    pub fn bind(&mut self, name: impl Into<String>, scheme: TypeScheme) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), scheme);
        }
    }

    /// Bind in the root scope.
    pub fn bind_global(&mut self, name: impl Into<String>, scheme: TypeScheme) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(name.into(), scheme);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeScheme> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Free type variables of every visible binding, after applying `subst`.
    pub fn free_vars(&self, subst: &Substitution) -> BTreeSet<TypeVar> {
        let mut out = BTreeSet::new();
        for scheme in self.scopes.iter().flat_map(|s| s.values()) {
            for var in scheme.free_vars() {
                subst.apply(&InferredType::Var(var)).collect_free_vars(&mut out);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_and_pops() {
        let mut env = TypeEnv::new();
        env.bind("x", TypeScheme::mono(InferredType::bool()));
        env.push_scope();
        env.bind("x", TypeScheme::mono(InferredType::unit()));
        assert_eq!(env.lookup("x").map(|s| &s.body), Some(&InferredType::unit()));
        let popped = env.pop_scope().unwrap_or_default();
        assert!(popped.contains_key("x"));
        assert_eq!(env.lookup("x").map(|s| &s.body), Some(&InferredType::bool()));
        assert!(env.pop_scope().is_none());
    }

    #[test]
    fn free_vars_respect_quantifiers_and_substitution() {
        let mut env = TypeEnv::new();
        env.bind(
            "id",
            TypeScheme::poly(
                vec![TypeVar(0)],
                InferredType::function(
                    vec![InferredType::Var(TypeVar(0))],
                    InferredType::Var(TypeVar(0)),
                    crate::types::EffectRow::pure(),
                ),
            ),
        );
        env.bind("y", TypeScheme::mono(InferredType::Var(TypeVar(1))));
        env.bind("z", TypeScheme::mono(InferredType::Var(TypeVar(2))));

        let mut subst = Substitution::default();
        subst.insert(TypeVar(2), InferredType::bool());

        let free: Vec<TypeVar> = env.free_vars(&subst).into_iter().collect();
        assert_eq!(free, vec![TypeVar(1)]);
    }
}
