#![forbid(unsafe_code)]

mod analysis;
mod builtins;
mod config;
mod constraints;
mod env;
mod error;
mod lifetime;
mod ownership;
mod typeck;
mod types;

pub use analysis::{Analysis, analyze};
pub use builtins::BuiltinCatalog;
pub use config::CheckConfig;
pub use constraints::{
    Constraint, ConstraintKind, ConstraintOrigin, Solver, Substitution, UnificationError,
    UnifyErrorKind, solve,
};
pub use env::{Scope, TypeEnv};
pub use error::{ErrorCategory, OwnershipError, TypeCheckError};
pub use lifetime::{LifetimeAnalyzer, LiveRange};
pub use ownership::{
    ActiveBorrow, BorrowHolder, BorrowKind, FlowState, OwnershipChecker, VariableState,
};
pub use typeck::TypeChecker;
pub use types::{ConcreteType, EffectRow, InferredType, TypeScheme, TypeVar, generalize};
