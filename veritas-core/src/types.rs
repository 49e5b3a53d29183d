#![forbid(unsafe_code)]

//! The inferred-type model: what the checker assigns to every expression.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use veritas_ast::{EffectKind, PrimitiveKind};

/// An inference placeholder, named `?N` when printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A fully resolved type lifted from type syntax.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ConcreteType {
    Primitive(PrimitiveKind),
    Unit,
    /// A nominal type without type arguments (`Point`, `Color`).
    Named(String),
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteType::Primitive(p) => write!(f, "{p}"),
            ConcreteType::Unit => f.write_str("()"),
            ConcreteType::Named(n) => f.write_str(n),
        }
    }
}

/// The effect component of a function type.
///
/// Declared signatures are always `Closed`. Call sites synthesize `Open`
/// rows, which unify with any effect set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum EffectRow {
    Closed(BTreeSet<EffectKind>),
    Open,
}

impl EffectRow {
    pub fn pure() -> Self {
        EffectRow::Closed(BTreeSet::new())
    }

    pub fn closed(kinds: impl IntoIterator<Item = EffectKind>) -> Self {
        EffectRow::Closed(kinds.into_iter().collect())
    }
}

impl fmt::Display for EffectRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectRow::Open => f.write_str(" !_"),
            EffectRow::Closed(set) if set.is_empty() => Ok(()),
            EffectRow::Closed(set) => {
                let kinds: Vec<String> = set.iter().map(|k| k.to_string()).collect();
                write!(f, " !{}", kinds.join(" + "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum InferredType {
    Var(TypeVar),
    Concrete(ConcreteType),
    Function {
        params: Vec<InferredType>,
        ret: Box<InferredType>,
        effects: EffectRow,
    },
    /// A type constructor applied to arguments: `Option<T>`, `Array<i32>`,
    /// and tuples as `Tuple<A, B>`.
    Generic {
        name: String,
        args: Vec<InferredType>,
    },
    /// A nominal wrapper; unifies only with the same brand.
    Branded {
        brand: String,
        base: Box<InferredType>,
    },
}

pub const TUPLE: &str = "Tuple";
pub const ARRAY: &str = "Array";
pub const RANGE: &str = "Range";
pub const OPTION: &str = "Option";
pub const RESULT: &str = "Result";

impl InferredType {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        InferredType::Concrete(ConcreteType::Primitive(kind))
    }

    pub fn unit() -> Self {
        InferredType::Concrete(ConcreteType::Unit)
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn named(name: impl Into<String>) -> Self {
        InferredType::Concrete(ConcreteType::Named(name.into()))
    }

    pub fn generic(name: impl Into<String>, args: Vec<InferredType>) -> Self {
        InferredType::Generic {
            name: name.into(),
            args,
        }
    }

    /// `()` for no elements, otherwise `Tuple<..>`.
    pub fn tuple(elems: Vec<InferredType>) -> Self {
        if elems.is_empty() {
            Self::unit()
        } else {
            Self::generic(TUPLE, elems)
        }
    }

    pub fn function(params: Vec<InferredType>, ret: InferredType, effects: EffectRow) -> Self {
        InferredType::Function {
            params,
            ret: Box::new(ret),
            effects,
        }
    }

    pub fn branded(brand: impl Into<String>, base: InferredType) -> Self {
        InferredType::Branded {
            brand: brand.into(),
            base: Box::new(base),
        }
    }

    pub fn as_var(&self) -> Option<TypeVar> {
        match self {
            InferredType::Var(v) => Some(*v),
            _ => None,
        }
    }

    /// The nominal name used to look up fields and methods.
    pub fn nominal_name(&self) -> Option<&str> {
        match self {
            InferredType::Concrete(ConcreteType::Named(n)) => Some(n),
            InferredType::Concrete(ConcreteType::Primitive(p)) => Some(p.name()),
            InferredType::Generic { name, .. } => Some(name),
            InferredType::Branded { brand, .. } => Some(brand),
            _ => None,
        }
    }

    pub fn occurs(&self, var: TypeVar) -> bool {
        match self {
            InferredType::Var(v) => *v == var,
            InferredType::Concrete(_) => false,
            InferredType::Function { params, ret, .. } => {
                params.iter().any(|p| p.occurs(var)) || ret.occurs(var)
            }
            InferredType::Generic { args, .. } => args.iter().any(|a| a.occurs(var)),
            InferredType::Branded { base, .. } => base.occurs(var),
        }
    }

    pub fn free_vars(&self) -> BTreeSet<TypeVar> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut out);
        out
    }

    pub(crate) fn collect_free_vars(&self, out: &mut BTreeSet<TypeVar>) {
        match self {
            InferredType::Var(v) => {
                out.insert(*v);
            }
            InferredType::Concrete(_) => {}
            InferredType::Function { params, ret, .. } => {
                params.iter().for_each(|p| p.collect_free_vars(out));
                ret.collect_free_vars(out);
            }
            InferredType::Generic { args, .. } => args.iter().for_each(|a| a.collect_free_vars(out)),
            InferredType::Branded { base, .. } => base.collect_free_vars(out),
        }
    }

    /// Replace variables according to `map`, one level deep (no chasing).
    pub fn rename(&self, map: &BTreeMap<TypeVar, InferredType>) -> InferredType {
        match self {
            InferredType::Var(v) => map.get(v).cloned().unwrap_or_else(|| self.clone()),
            InferredType::Concrete(_) => self.clone(),
            InferredType::Function {
                params,
                ret,
                effects,
            } => InferredType::Function {
                params: params.iter().map(|p| p.rename(map)).collect(),
                ret: Box::new(ret.rename(map)),
                effects: effects.clone(),
            },
            InferredType::Generic { name, args } => InferredType::Generic {
                name: name.clone(),
                args: args.iter().map(|a| a.rename(map)).collect(),
            },
            InferredType::Branded { brand, base } => InferredType::Branded {
                brand: brand.clone(),
                base: Box::new(base.rename(map)),
            },
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Var(v) => write!(f, "{v}"),
            InferredType::Concrete(c) => write!(f, "{c}"),
            InferredType::Function {
                params,
                ret,
                effects,
            } => {
                write!(f, "fn({}) -> {ret}{effects}", join(params))
            }
            InferredType::Generic { name, args } if name == TUPLE => write!(f, "({})", join(args)),
            InferredType::Generic { name, args } => write!(f, "{name}<{}>", join(args)),
            InferredType::Branded { brand, base } => write!(f, "{base} as {brand}"),
        }
    }
}

fn join(types: &[InferredType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `∀ vars. body`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeScheme {
    pub vars: Vec<TypeVar>,
    pub body: InferredType,
}

impl TypeScheme {
    pub fn mono(body: InferredType) -> Self {
        Self {
            vars: Vec::new(),
            body,
        }
    }

    pub fn poly(vars: Vec<TypeVar>, body: InferredType) -> Self {
        Self { vars, body }
    }

    pub fn is_mono(&self) -> bool {
        self.vars.is_empty()
    }

    /// Free variables of the body that are not quantified.
    pub fn free_vars(&self) -> BTreeSet<TypeVar> {
        let mut out = self.body.free_vars();
        for v in &self.vars {
            out.remove(v);
        }
        out
    }

    /// Replace every quantified variable with a fresh one. Variables captured
    /// from the environment are left alone.
    pub fn instantiate(&self, mut fresh: impl FnMut() -> TypeVar) -> InferredType {
        if self.vars.is_empty() {
            return self.body.clone();
        }
        let map: BTreeMap<TypeVar, InferredType> = self
            .vars
            .iter()
            .map(|v| (*v, InferredType::Var(fresh())))
            .collect();
        self.body.rename(&map)
    }
}

/// Quantify the variables of `ty` that are not free in the environment.
pub fn generalize(env_free: &BTreeSet<TypeVar>, ty: InferredType) -> TypeScheme {
    let vars = ty
        .free_vars()
        .into_iter()
        .filter(|v| !env_free.contains(v))
        .collect();
    TypeScheme::poly(vars, ty)
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vars.is_empty() {
            return write!(f, "{}", self.body);
        }
        let vars: Vec<String> = self.vars.iter().map(|v| v.to_string()).collect();
        write!(f, "forall {}. {}", vars.join(" "), self.body)
    }
}
