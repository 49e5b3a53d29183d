#![forbid(unsafe_code)]

//! Hindley-Milner inference over a whole `Program`.
//!
//! Checking runs in three passes over the items. The first registers type
//! names (aliases, structs, enums, traits, imports). The second binds every
//! function, constant, enum constructor and impl method signature in the root
//! environment, so bodies may refer to items declared later. The third walks
//! bodies and collects constraints. The solver then runs once over the
//! collected list; member accesses whose receiver was unknown during the walk
//! are resolved against the solved types, and the substitution is applied to
//! every recorded expression type.
//!
//! Errors found during the walk never stop it. A failed solve is reported
//! once and leaves expression types unsubstituted.
//!
//! Effects are checked in two ways. A call site expects the callee type with
//! an open effect row, so calling an effectful function never fails to
//! unify; instead each call is recorded and, after solving, the callee's
//! closed row is compared with the effects the enclosing function declares.
//! Two closed rows, as when a function value is passed where a typed
//! parameter is declared, unify only when they are equal.

mod expr;
mod members;
mod pattern;
mod resolve;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;
use veritas_ast::{
    EffectKind, EnumDef, ExprId, FunctionDef, GenericParam, ImplBlock, Import, Item, Program,
    Span, StructDef, TraitDef, TypeAlias, TypeExpr, TypeExprKind,
};

use crate::builtins::BuiltinCatalog;
use crate::constraints::{Constraint, ConstraintOrigin, Solver, Substitution, UnificationError};
use crate::env::TypeEnv;
use crate::error::{ErrorCategory, TypeCheckError};
use crate::types::{EffectRow, InferredType, TypeScheme, TypeVar};

use members::{Deferred, EffectSite};

/// A function signature as seen from its own body.
#[derive(Clone, Debug)]
struct FnSig {
    params: Vec<InferredType>,
    ret: InferredType,
    effects: BTreeSet<EffectKind>,
    /// Generic parameters visible in the body: impl generics, then the
    /// function's own. Each maps to one type variable.
    generics: Vec<(String, InferredType)>,
}

impl FnSig {
    fn fn_type(&self) -> InferredType {
        InferredType::function(
            self.params.clone(),
            self.ret.clone(),
            EffectRow::Closed(self.effects.clone()),
        )
    }

    /// Quantified over the declared generics only.
    fn scheme(&self) -> TypeScheme {
        let vars = self.generics.iter().filter_map(|(_, t)| t.as_var()).collect();
        TypeScheme::poly(vars, self.fn_type())
    }
}

/// The function (or lambda) whose body is being walked.
#[derive(Clone, Debug)]
struct FnFrame {
    name: String,
    ret: InferredType,
    effects: BTreeSet<EffectKind>,
    is_async: bool,
}

#[derive(Clone, Debug)]
struct LoopFrame {
    /// `Some` for `loop`, whose `break` may carry a value.
    break_ty: Option<InferredType>,
}

#[derive(Clone, Debug)]
struct ImplInfo {
    type_name: String,
    self_ty: InferredType,
}

#[derive(Clone, Debug)]
struct GenericCheck {
    function: String,
    param: String,
    span: Span,
}

pub struct TypeChecker {
    catalog: BuiltinCatalog,
    check_effects: bool,

    env: TypeEnv,
    constraints: Vec<Constraint>,
    solver: Solver,
    next_var: u32,

    errors: Vec<TypeCheckError>,
    expr_types: HashMap<ExprId, InferredType>,
    branded_types: BTreeMap<String, TypeExpr>,
    substitution: Substitution,

    aliases: HashMap<String, TypeAlias>,
    structs: HashMap<String, StructDef>,
    enums: HashMap<String, EnumDef>,
    traits: HashMap<String, TraitDef>,
    opaque_types: HashSet<String>,
    constructors: HashMap<String, TypeScheme>,
    methods: HashMap<(String, String), TypeScheme>,
    signatures: HashMap<String, FnSig>,
    consts: HashMap<String, InferredType>,
    impls: Vec<ImplInfo>,

    type_params: Vec<HashMap<String, InferredType>>,
    self_ty: Option<InferredType>,
    fn_stack: Vec<FnFrame>,
    loops: Vec<LoopFrame>,
    resolving_aliases: Vec<String>,

    deferred: Vec<Deferred>,
    effect_sites: Vec<EffectSite>,
    generic_checks: BTreeMap<TypeVar, GenericCheck>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        Self::with_catalog(BuiltinCatalog::standard())
    }

    pub fn with_catalog(catalog: BuiltinCatalog) -> Self {
        Self {
            catalog,
            check_effects: true,
            env: TypeEnv::new(),
            constraints: Vec::new(),
            solver: Solver::new(),
            next_var: 0,
            errors: Vec::new(),
            expr_types: HashMap::new(),
            branded_types: BTreeMap::new(),
            substitution: Substitution::default(),
            aliases: HashMap::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            traits: HashMap::new(),
            opaque_types: HashSet::new(),
            constructors: HashMap::new(),
            methods: HashMap::new(),
            signatures: HashMap::new(),
            consts: HashMap::new(),
            impls: Vec::new(),
            type_params: Vec::new(),
            self_ty: None,
            fn_stack: Vec::new(),
            loops: Vec::new(),
            resolving_aliases: Vec::new(),
            deferred: Vec::new(),
            effect_sites: Vec::new(),
            generic_checks: BTreeMap::new(),
        }
    }

    /// Enable or disable the post-solve effect annotation check.
    pub fn check_effects(mut self, enabled: bool) -> Self {
        self.check_effects = enabled;
        self
    }

    pub fn errors(&self) -> &[TypeCheckError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<TypeCheckError> {
        std::mem::take(&mut self.errors)
    }

    /// Every visited expression's type, substituted when solving succeeded.
    pub fn expr_types(&self) -> &HashMap<ExprId, InferredType> {
        &self.expr_types
    }

    pub fn type_of(&self, id: ExprId) -> Option<&InferredType> {
        self.expr_types.get(&id)
    }

    /// Brand name → base type syntax, for every branded alias.
    pub fn branded_types(&self) -> &BTreeMap<String, TypeExpr> {
        &self.branded_types
    }

    /// The root binding of `name` with the final substitution applied.
    pub fn binding(&self, name: &str) -> Option<TypeScheme> {
        self.env.lookup(name).map(|scheme| TypeScheme {
            vars: scheme.vars.clone(),
            body: self.substitution.apply(&scheme.body),
        })
    }

    /// Check one compilation unit. True when no errors were recorded and the
    /// final unification succeeded.
    #[tracing::instrument(level = "debug", skip_all, fields(items = program.items.len()))]
    pub fn check_program(&mut self, program: &Program) -> bool {
        self.reset();
        self.install_builtins();

        self.register_types(program);
        debug!("type registration complete");
        self.register_signatures(program);
        debug!("signature collection complete");
        self.check_bodies(program);
        debug!(constraints = self.constraints.len(), "body checking complete");

        let solved = self.finish();
        debug!(solved, errors = self.errors.len(), "type checking complete");
        solved && self.errors.is_empty()
    }

    fn reset(&mut self) {
        let catalog = std::mem::replace(&mut self.catalog, BuiltinCatalog::empty());
        let check_effects = self.check_effects;
        *self = Self::with_catalog(catalog).check_effects(check_effects);
    }

    fn install_builtins(&mut self) {
        for (name, scheme) in self.catalog.values() {
            self.env.bind_global(name.clone(), scheme.clone());
            if let Some(ctor) = self.catalog.constructor(name) {
                self.constructors.insert(name.clone(), ctor.clone());
            }
        }
        for (key, scheme) in self.catalog.methods() {
            self.methods.insert(key.clone(), scheme.clone());
        }
    }

    // ---- helpers shared by the submodules ----

    fn fresh_var(&mut self) -> TypeVar {
        let v = TypeVar(self.next_var);
        self.next_var += 1;
        v
    }

    fn fresh(&mut self) -> InferredType {
        InferredType::Var(self.fresh_var())
    }

    fn instantiate(&mut self, scheme: &TypeScheme) -> InferredType {
        let next = &mut self.next_var;
        scheme.instantiate(|| {
            let v = TypeVar(*next);
            *next += 1;
            v
        })
    }

    fn constrain(
        &mut self,
        expected: InferredType,
        actual: InferredType,
        span: &Span,
        origin: ConstraintOrigin,
    ) {
        self.constraints
            .push(Constraint::equal(expected, actual, span.clone(), origin));
    }

    fn error(&mut self, category: ErrorCategory, message: impl Into<String>, span: &Span) {
        self.errors
            .push(TypeCheckError::new(category, message, span.clone()));
    }

    fn report_unification(&mut self, err: UnificationError) {
        debug!(%err, "unification failed");
        self.errors
            .push(TypeCheckError::new(err.category(), err.message(), err.span.clone()));
    }

    fn generic_scope(&mut self, generics: &[GenericParam]) -> Vec<(String, InferredType)> {
        generics
            .iter()
            .map(|g| (g.name.node.clone(), self.fresh()))
            .collect()
    }

    fn is_type_declared(&self, name: &str) -> bool {
        self.aliases.contains_key(name) || self.structs.contains_key(name) || self.enums.contains_key(name)
    }

    // ---- pass 1: type names ----

    fn register_types(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::TypeAlias(alias) => {
                    if self.is_type_declared(&alias.name.node) {
                        self.duplicate_type(&alias.name.node, &alias.name.span);
                        continue;
                    }
                    if let TypeExprKind::Branded { base, brand } = &alias.target.kind {
                        self.branded_types.insert(brand.clone(), (**base).clone());
                    }
                    self.aliases.insert(alias.name.node.clone(), alias.clone());
                }
                Item::Struct(def) => {
                    if self.is_type_declared(&def.name.node) {
                        self.duplicate_type(&def.name.node, &def.name.span);
                        continue;
                    }
                    self.structs.insert(def.name.node.clone(), def.clone());
                }
                Item::Enum(def) => {
                    if self.is_type_declared(&def.name.node) {
                        self.duplicate_type(&def.name.node, &def.name.span);
                        continue;
                    }
                    self.enums.insert(def.name.node.clone(), def.clone());
                }
                Item::Trait(def) => {
                    self.traits.insert(def.name.node.clone(), def.clone());
                }
                Item::Import(import) => self.register_import(import),
                Item::Function(_) | Item::Const(_) | Item::Impl(_) => {}
            }
        }
    }

    fn duplicate_type(&mut self, name: &str, span: &Span) {
        self.error(
            ErrorCategory::Name,
            format!("type `{name}` is defined more than once"),
            span,
        );
    }

    /// Imported names are opaque: usable as any type and as any value.
    fn register_import(&mut self, import: &Import) {
        let names: Vec<String> = if !import.items.is_empty() {
            import.items.iter().map(|i| i.node.clone()).collect()
        } else if let Some(alias) = &import.alias {
            vec![alias.node.clone()]
        } else {
            import.path.last().map(|seg| seg.node.clone()).into_iter().collect()
        };
        for name in names {
            let var = self.fresh_var();
            self.env
                .bind_global(name.clone(), TypeScheme::poly(vec![var], InferredType::Var(var)));
            self.opaque_types.insert(name);
        }
    }

    // ---- pass 2: signatures ----

    fn register_signatures(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::Function(def) => {
                    let name = def.name.node.clone();
                    if self.signatures.contains_key(&name) {
                        self.error(
                            ErrorCategory::Name,
                            format!("function `{name}` is defined more than once"),
                            &def.name.span,
                        );
                        continue;
                    }
                    let sig = self.function_signature(def, &[]);
                    self.env.bind_global(name.clone(), sig.scheme());
                    self.signatures.insert(name, sig);
                }
                Item::Const(def) => {
                    let ty = self.resolve_type(&def.ty);
                    self.env
                        .bind_global(def.name.node.clone(), TypeScheme::mono(ty.clone()));
                    self.consts.insert(def.name.node.clone(), ty);
                }
                Item::Enum(def) => self.register_variants(def),
                Item::Impl(block) => self.register_impl(block),
                Item::Trait(def) => self.register_trait(def),
                Item::Struct(_) | Item::TypeAlias(_) | Item::Import(_) => {}
            }
        }
    }

    fn function_signature(
        &mut self,
        def: &FunctionDef,
        outer: &[(String, InferredType)],
    ) -> FnSig {
        let mut generics = outer.to_vec();
        generics.extend(self.generic_scope(&def.generics));
        self.type_params.push(generics.iter().cloned().collect());

        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = match (&param.ty, self.self_ty.clone()) {
                (Some(ty), _) => self.resolve_type(ty),
                (None, Some(self_ty)) if param.name.node == "self" => self_ty,
                (None, _) => self.fresh(),
            };
            params.push(ty);
        }
        let ret = match &def.ret {
            Some(ty) => self.resolve_type(ty),
            None => InferredType::unit(),
        };
        self.type_params.pop();

        let mut effects: BTreeSet<EffectKind> = def.effects.iter().map(|e| e.kind).collect();
        if def.is_async {
            effects.insert(EffectKind::Async);
        }
        FnSig {
            params,
            ret,
            effects,
            generics,
        }
    }

    /// Tuple variants become constructor functions, unit variants values,
    /// both under `Enum::Variant`.
    fn register_variants(&mut self, def: &EnumDef) {
        let params = self.generic_scope(&def.generics);
        let vars: Vec<TypeVar> = params.iter().filter_map(|(_, t)| t.as_var()).collect();
        let result = if params.is_empty() {
            InferredType::named(def.name.node.clone())
        } else {
            InferredType::generic(def.name.node.clone(), params.iter().map(|(_, t)| t.clone()).collect())
        };

        self.type_params.push(params.into_iter().collect());
        for variant in &def.variants {
            let body = if variant.fields.is_empty() {
                result.clone()
            } else {
                let fields = variant.fields.iter().map(|f| self.resolve_type(f)).collect();
                InferredType::function(fields, result.clone(), EffectRow::pure())
            };
            let scheme = TypeScheme::poly(vars.clone(), body);
            let path = format!("{}::{}", def.name.node, variant.name.node);
            self.env.bind_global(path.clone(), scheme.clone());
            self.constructors.insert(path, scheme);
        }
        self.type_params.pop();
    }

    fn register_method(&mut self, type_name: &str, def: &FunctionDef, outer: &[(String, InferredType)]) {
        let sig = self.function_signature(def, outer);
        let qualified = format!("{type_name}::{}", def.name.node);
        let scheme = sig.scheme();
        self.env.bind_global(qualified.clone(), scheme.clone());
        self.methods
            .insert((type_name.to_string(), def.name.node.clone()), scheme);
        self.signatures.insert(qualified, sig);
    }

    fn register_impl(&mut self, block: &ImplBlock) {
        let impl_generics = self.generic_scope(&block.generics);
        self.type_params.push(impl_generics.iter().cloned().collect());
        let self_ty = self.resolve_type(&block.target);
        self.type_params.pop();

        let type_name = self_ty
            .nominal_name()
            .map(str::to_string)
            .unwrap_or_else(|| block.target.to_string());
        let previous = self.self_ty.replace(self_ty.clone());

        for method in &block.methods {
            self.register_method(&type_name, method, &impl_generics);
        }

        if let Some(trait_name) = &block.trait_name {
            match self.traits.get(&trait_name.node).cloned() {
                None => self.error(
                    ErrorCategory::Name,
                    format!("undefined trait `{}`", trait_name.node),
                    &trait_name.span,
                ),
                Some(def) => {
                    for required in &def.methods {
                        if block.methods.iter().any(|m| m.name.node == required.name.node) {
                            continue;
                        }
                        if required.body.is_some() {
                            // Default method: callable on the implementing type.
                            self.register_method(&type_name, required, &impl_generics);
                        } else {
                            self.error(
                                ErrorCategory::Type,
                                format!(
                                    "missing trait method `{}` in impl of `{}` for `{type_name}`",
                                    required.name.node, trait_name.node
                                ),
                                &block.span,
                            );
                        }
                    }
                    for method in &block.methods {
                        if !def.methods.iter().any(|m| m.name.node == method.name.node) {
                            self.error(
                                ErrorCategory::Name,
                                format!(
                                    "method `{}` is not a member of trait `{}`",
                                    method.name.node, trait_name.node
                                ),
                                &method.name.span,
                            );
                        }
                    }
                }
            }
        }

        self.self_ty = previous;
        self.impls.push(ImplInfo { type_name, self_ty });
    }

    /// Trait methods are typed against `Self` = the trait's own nominal type,
    /// so default bodies can call sibling methods on `self`.
    fn register_trait(&mut self, def: &TraitDef) {
        let self_ty = InferredType::named(def.name.node.clone());
        let previous = self.self_ty.replace(self_ty);
        let generics = self.generic_scope(&def.generics);
        for method in &def.methods {
            self.register_method(&def.name.node, method, &generics);
        }
        self.self_ty = previous;
    }

    // ---- pass 3: bodies ----

    fn check_bodies(&mut self, program: &Program) {
        let mut impls = self.impls.clone().into_iter();
        for item in &program.items {
            match item {
                Item::Function(def) => self.check_function(def, &def.name.node),
                Item::Const(def) => {
                    let actual = self.infer_expr(&def.value);
                    if let Some(declared) = self.consts.get(&def.name.node).cloned() {
                        self.constrain(declared, actual, &def.value.span, ConstraintOrigin::Annotation);
                    }
                }
                Item::Impl(block) => {
                    let Some(info) = impls.next() else { continue };
                    let previous = self.self_ty.replace(info.self_ty);
                    for method in &block.methods {
                        self.check_function(method, &format!("{}::{}", info.type_name, method.name.node));
                    }
                    self.self_ty = previous;
                }
                Item::Trait(def) => {
                    let previous = self.self_ty.replace(InferredType::named(def.name.node.clone()));
                    for method in &def.methods {
                        self.check_function(method, &format!("{}::{}", def.name.node, method.name.node));
                    }
                    self.self_ty = previous;
                }
                Item::Struct(_) | Item::Enum(_) | Item::TypeAlias(_) | Item::Import(_) => {}
            }
        }
    }

    fn check_function(&mut self, def: &FunctionDef, qualified: &str) {
        let Some(body) = &def.body else { return };
        let Some(sig) = self.signatures.get(qualified).cloned() else { return };
        debug!(function = qualified, "checking function body");

        self.env.push_scope();
        self.type_params.push(sig.generics.iter().cloned().collect());
        // Monomorphic inside its own body.
        self.env.bind(qualified, TypeScheme::mono(sig.fn_type()));
        for (param, ty) in def.params.iter().zip(&sig.params) {
            self.env.bind(param.name.node.clone(), TypeScheme::mono(ty.clone()));
        }
        self.fn_stack.push(FnFrame {
            name: qualified.to_string(),
            ret: sig.ret.clone(),
            effects: sig.effects.clone(),
            is_async: def.is_async || sig.effects.contains(&EffectKind::Async),
        });

        for contract in &def.contracts {
            let ensures = contract.kind == veritas_ast::ContractKind::Ensures;
            if ensures {
                self.env.push_scope();
                self.env.bind("result", TypeScheme::mono(sig.ret.clone()));
            }
            let ty = self.infer_expr(&contract.condition);
            self.constrain(InferredType::bool(), ty, &contract.condition.span, ConstraintOrigin::Contract);
            if ensures {
                self.env.pop_scope();
            }
        }

        let body_ty = self.infer_block(body);
        let span = body.tail.as_ref().map_or(&body.span, |t| &t.span);
        self.constrain(sig.ret.clone(), body_ty, span, ConstraintOrigin::Return);

        self.fn_stack.pop();
        self.type_params.pop();
        self.env.pop_scope();

        for (param, ty) in &sig.generics {
            if let Some(var) = ty.as_var() {
                self.generic_checks.entry(var).or_insert_with(|| GenericCheck {
                    function: qualified.to_string(),
                    param: param.clone(),
                    span: def.name.span.clone(),
                });
            }
        }
    }

    // ---- after the walk ----

    fn finish(&mut self) -> bool {
        if let Err(err) = self.solver.solve_pending(&self.constraints) {
            self.report_unification(err);
            return false;
        }
        if let Err(err) = self.resolve_deferred() {
            self.report_unification(err);
            return false;
        }
        self.check_generic_params();
        if self.check_effects {
            self.check_effect_sites();
        }

        self.substitution = self.solver.substitution().clone();
        for ty in self.expr_types.values_mut() {
            *ty = self.substitution.apply(ty);
        }
        true
    }

    /// A declared generic parameter must stay abstract in its own body, and
    /// distinct from every other declared parameter.
    fn check_generic_params(&mut self) {
        let checks = std::mem::take(&mut self.generic_checks);
        let mut seen: BTreeMap<TypeVar, GenericCheck> = BTreeMap::new();
        for (var, check) in checks {
            let resolved = self.solver.apply(&InferredType::Var(var));
            let Some(target) = resolved.as_var() else {
                self.error(
                    ErrorCategory::Type,
                    format!(
                        "generic parameter `{}` of `{}` is constrained to `{resolved}`",
                        check.param, check.function
                    ),
                    &check.span,
                );
                continue;
            };
            match seen.get(&target) {
                Some(first) => self.error(
                    ErrorCategory::Type,
                    format!(
                        "generic parameters `{}` and `{}` of `{}` are constrained to be the same type",
                        first.param, check.param, check.function
                    ),
                    &check.span,
                ),
                None => {
                    seen.insert(target, check);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::build::*;
    use veritas_ast::BinOp;

    fn check(items: Vec<Item>) -> TypeChecker {
        let mut checker = TypeChecker::new();
        checker.check_program(&program(items));
        checker
    }

    #[test]
    fn functions_may_call_later_functions() {
        let checker = check(vec![
            func("first")
                .returns(ty("i32"))
                .body(block(vec![], Some(call(ident("second"), vec![]))))
                .item(),
            func("second").returns(ty("i32")).body(block(vec![], Some(int(2)))).item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn generic_parameter_must_stay_abstract() {
        let checker = check(vec![
            func("bad")
                .generic("T")
                .param("x", ty("T"))
                .returns(ty("T"))
                .body(block(vec![], Some(binary(BinOp::Add, ident("x"), int(1)))))
                .item(),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert!(checker.errors()[0].message.contains("generic parameter `T`"));
    }

    #[test]
    fn independent_generic_parameters_may_share_a_call_site() {
        let checker = check(vec![
            func("pair")
                .generic("A")
                .generic("B")
                .param("a", ty("A"))
                .param("b", ty("B"))
                .returns(ty("A"))
                .body(block(vec![], Some(ident("a"))))
                .item(),
            func("main")
                .body(block(vec![let_("n", call(ident("pair"), vec![int(1), int(2)]))], None))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn check_program_resets_state() {
        let mut checker = TypeChecker::new();
        let bad = program(vec![func("f").body(block(vec![], Some(ident("nope")))).item()]);
        assert!(!checker.check_program(&bad));
        let good = program(vec![func("f").body(block(vec![], None)).item()]);
        assert!(checker.check_program(&good));
        assert!(checker.errors().is_empty());
    }

    #[test]
    fn duplicate_functions_are_reported() {
        let checker = check(vec![
            func("f").body(block(vec![], None)).item(),
            func("f").body(block(vec![], None)).item(),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert_eq!(checker.errors()[0].category, ErrorCategory::Name);
    }

    #[test]
    fn missing_trait_method_is_reported() {
        let speak = func("speak").untyped_param("self").returns(ty("str")).build();
        let checker = check(vec![
            struct_def("Dog", &[], vec![]),
            trait_def("Speak", vec![speak]),
            impl_block(ty("Dog"), Some("Speak"), vec![]),
        ]);
        assert_eq!(checker.errors().len(), 1);
        assert!(checker.errors()[0].message.contains("missing trait method `speak`"));
    }

    #[test]
    fn trait_default_methods_reach_implementors() {
        let name = func("name").untyped_param("self").returns(ty("str")).build();
        let greet = func("greet")
            .untyped_param("self")
            .returns(ty("str"))
            .body(block(vec![], Some(method(ident("self"), "name", vec![]))))
            .build();
        let dog_name = func("name")
            .untyped_param("self")
            .returns(ty("str"))
            .body(block(vec![], Some(string("rex"))))
            .build();
        let checker = check(vec![
            struct_def("Dog", &[], vec![]),
            trait_def("Named", vec![name, greet]),
            impl_block(ty("Dog"), Some("Named"), vec![dog_name]),
            func("main")
                .returns(ty("str"))
                .body(block(
                    vec![let_("d", struct_lit("Dog", vec![]))],
                    Some(method(ident("d"), "greet", vec![])),
                ))
                .item(),
        ]);
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }
}
