#![forbid(unsafe_code)]

//! Pre-registered signatures the checker treats as already typed.

use std::collections::BTreeMap;

use veritas_ast::{EffectKind, PrimitiveKind};

use crate::types::{ARRAY, EffectRow, InferredType, OPTION, RANGE, RESULT, TypeScheme, TypeVar};

#[derive(Clone, Debug)]
pub struct BuiltinCatalog {
    values: BTreeMap<String, TypeScheme>,
    /// Values that may also appear as constructor patterns (`Some(x)`).
    constructors: BTreeMap<String, TypeScheme>,
    /// Type constructors and their arity.
    types: BTreeMap<String, usize>,
    aliases: BTreeMap<String, InferredType>,
    methods: BTreeMap<(String, String), TypeScheme>,
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn v(n: u32) -> InferredType {
    InferredType::Var(TypeVar(n))
}

fn prim(kind: PrimitiveKind) -> InferredType {
    InferredType::primitive(kind)
}

fn pure_fn(params: Vec<InferredType>, ret: InferredType) -> InferredType {
    InferredType::function(params, ret, EffectRow::pure())
}

impl BuiltinCatalog {
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            constructors: BTreeMap::new(),
            types: BTreeMap::new(),
            aliases: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// `Option`, `Result`, arrays, ranges and console output.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        let option = |t| InferredType::generic(OPTION, vec![t]);
        let result = |t, e| InferredType::generic(RESULT, vec![t, e]);
        let array = |t| InferredType::generic(ARRAY, vec![t]);

        catalog.register_type(OPTION, 1);
        catalog.register_type(RESULT, 2);
        catalog.register_type(ARRAY, 1);
        catalog.register_type(RANGE, 1);
        catalog.register_alias("String", prim(PrimitiveKind::Str));

        let some = TypeScheme::poly(vec![TypeVar(0)], pure_fn(vec![v(0)], option(v(0))));
        let none = TypeScheme::poly(vec![TypeVar(0)], option(v(0)));
        let ok = TypeScheme::poly(
            vec![TypeVar(0), TypeVar(1)],
            pure_fn(vec![v(0)], result(v(0), v(1))),
        );
        let err = TypeScheme::poly(
            vec![TypeVar(0), TypeVar(1)],
            pure_fn(vec![v(1)], result(v(0), v(1))),
        );
        for (name, scheme) in [("Some", some), ("None", none)] {
            catalog.register_constructor(format!("{OPTION}::{name}"), scheme.clone());
            catalog.register_constructor(name, scheme);
        }
        for (name, scheme) in [("Ok", ok), ("Err", err)] {
            catalog.register_constructor(format!("{RESULT}::{name}"), scheme.clone());
            catalog.register_constructor(name, scheme);
        }

        let console = TypeScheme::mono(InferredType::function(
            vec![prim(PrimitiveKind::Str)],
            InferredType::unit(),
            EffectRow::closed([EffectKind::IO]),
        ));
        catalog.register_value("print", console.clone());
        catalog.register_value("println", console);

        let len = pure_fn(vec![prim(PrimitiveKind::Str)], prim(PrimitiveKind::U64));
        catalog.register_method("str", "len", TypeScheme::mono(len));
        catalog.register_method(
            ARRAY,
            "len",
            TypeScheme::poly(vec![TypeVar(0)], pure_fn(vec![array(v(0))], prim(PrimitiveKind::U64))),
        );
        catalog.register_method(
            ARRAY,
            "push",
            TypeScheme::poly(
                vec![TypeVar(0)],
                InferredType::function(
                    vec![array(v(0)), v(0)],
                    InferredType::unit(),
                    EffectRow::closed([EffectKind::State]),
                ),
            ),
        );
        catalog.register_method(
            OPTION,
            "is_some",
            TypeScheme::poly(vec![TypeVar(0)], pure_fn(vec![option(v(0))], InferredType::bool())),
        );
        catalog.register_method(
            OPTION,
            "unwrap",
            TypeScheme::poly(vec![TypeVar(0)], pure_fn(vec![option(v(0))], v(0))),
        );
        catalog.register_method(
            RESULT,
            "is_ok",
            TypeScheme::poly(
                vec![TypeVar(0), TypeVar(1)],
                pure_fn(vec![result(v(0), v(1))], InferredType::bool()),
            ),
        );
        catalog.register_method(
            RESULT,
            "unwrap",
            TypeScheme::poly(vec![TypeVar(0), TypeVar(1)], pure_fn(vec![result(v(0), v(1))], v(0))),
        );
        catalog
    }

    pub fn register_value(&mut self, name: impl Into<String>, scheme: TypeScheme) {
        self.values.insert(name.into(), scheme);
    }

    pub fn register_constructor(&mut self, name: impl Into<String>, scheme: TypeScheme) {
        let name = name.into();
        self.values.insert(name.clone(), scheme.clone());
        self.constructors.insert(name, scheme);
    }

    pub fn register_type(&mut self, name: impl Into<String>, arity: usize) {
        self.types.insert(name.into(), arity);
    }

    pub fn register_alias(&mut self, name: impl Into<String>, ty: InferredType) {
        self.aliases.insert(name.into(), ty);
    }

    /// `receiver_type::method`; the first parameter is the receiver.
    pub fn register_method(
        &mut self,
        type_name: impl Into<String>,
        method: impl Into<String>,
        scheme: TypeScheme,
    ) {
        self.methods.insert((type_name.into(), method.into()), scheme);
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &TypeScheme)> {
        self.values.iter()
    }

    pub fn constructor(&self, name: &str) -> Option<&TypeScheme> {
        self.constructors.get(name)
    }

    pub fn type_arity(&self, name: &str) -> Option<usize> {
        self.types.get(name).copied()
    }

    pub fn alias(&self, name: &str) -> Option<&InferredType> {
        self.aliases.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&(String, String), &TypeScheme)> {
        self.methods.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_option_constructors() {
        let catalog = BuiltinCatalog::standard();
        let some = catalog.constructor("Some").unwrap();
        assert_eq!(some.vars.len(), 1);
        assert_eq!(some.to_string(), "forall ?0. fn(?0) -> Option<?0>");
        assert!(catalog.constructor("Option::None").is_some());
        assert!(catalog.constructor("println").is_none());
    }

    #[test]
    fn console_output_performs_io() {
        let catalog = BuiltinCatalog::standard();
        let (_, println) = catalog.values().find(|(n, _)| n.as_str() == "println").unwrap();
        assert_eq!(println.body.to_string(), "fn(str) -> () !IO");
    }

    #[test]
    fn empty_catalog_can_be_extended() {
        let mut catalog = BuiltinCatalog::empty();
        assert_eq!(catalog.type_arity(OPTION), None);
        catalog.register_type("Map", 2);
        catalog.register_method("Map", "len", TypeScheme::mono(InferredType::unit()));
        assert_eq!(catalog.type_arity("Map"), Some(2));
        assert_eq!(catalog.methods().count(), 1);
    }
}
