#![forbid(unsafe_code)]

//! Both passes over one compilation unit.

use std::collections::{BTreeMap, HashMap};

use tracing::info;
use veritas_ast::{ExprId, Program, TypeExpr};

use crate::config::CheckConfig;
use crate::error::{OwnershipError, TypeCheckError};
use crate::lifetime::LiveRange;
use crate::ownership::OwnershipChecker;
use crate::typeck::TypeChecker;
use crate::types::InferredType;

/// Everything the passes produce for the code generator and the reporter.
#[derive(Debug, Default)]
pub struct Analysis {
    pub type_ok: bool,
    pub ownership_ok: bool,
    pub type_errors: Vec<TypeCheckError>,
    pub ownership_errors: Vec<OwnershipError>,
    pub expr_types: HashMap<ExprId, InferredType>,
    pub branded_types: BTreeMap<String, TypeExpr>,
    pub live_ranges: BTreeMap<String, Vec<LiveRange>>,
}

impl Analysis {
    /// Code generation may proceed.
    pub fn ok(&self) -> bool {
        self.type_ok && self.ownership_ok
    }

    pub fn error_count(&self) -> usize {
        self.type_errors.len() + self.ownership_errors.len()
    }
}

/// Type-check `program`, then (independently) ownership-check it.
pub fn analyze(program: &Program, config: &CheckConfig) -> Analysis {
    let mut checker = TypeChecker::new().check_effects(config.effects);
    let type_ok = checker.check_program(program);

    let mut analysis = Analysis {
        type_ok,
        ownership_ok: true,
        type_errors: checker.take_errors(),
        expr_types: checker.expr_types().clone(),
        branded_types: checker.branded_types().clone(),
        ..Analysis::default()
    };

    if config.ownership {
        let mut ownership = OwnershipChecker::new().track_lifetimes(config.track_lifetimes);
        analysis.ownership_ok = ownership.check_program(program);
        analysis.ownership_errors = ownership.take_errors();
        analysis.live_ranges = ownership.live_ranges().clone();
    }

    info!(
        type_errors = analysis.type_errors.len(),
        ownership_errors = analysis.ownership_errors.len(),
        "analysis finished"
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_ast::build::*;

    fn moves_twice() -> Program {
        program(vec![
            func("main")
                .body(block(
                    vec![
                        let_("x", int(1)),
                        let_("y", ident("x")),
                        let_("z", ident("x")),
                    ],
                    None,
                ))
                .item(),
        ])
    }

    #[test]
    fn both_passes_run_by_default() {
        let analysis = analyze(&moves_twice(), &CheckConfig::default());
        assert!(analysis.type_ok);
        assert!(!analysis.ownership_ok);
        assert_eq!(analysis.ownership_errors.len(), 1);
        assert!(!analysis.ok());
        assert!(!analysis.expr_types.is_empty());
    }

    #[test]
    fn ownership_pass_can_be_disabled() {
        let config = CheckConfig {
            ownership: false,
            ..CheckConfig::default()
        };
        let analysis = analyze(&moves_twice(), &config);
        assert!(analysis.ok());
        assert_eq!(analysis.error_count(), 0);
    }
}
