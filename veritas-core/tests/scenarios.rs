use veritas_ast::build::*;
use veritas_ast::{BinOp, Item, Program};
use veritas_core::{CheckConfig, ErrorCategory, TypeChecker, analyze};

fn consume() -> Item {
    func("consume")
        .param("v", ty("i32"))
        .body(block(vec![], None))
        .item()
}

fn main_with(stmts: Vec<veritas_ast::Stmt>) -> Item {
    func("main").body(block(stmts, None)).item()
}

fn analyze_default(program: &Program) -> veritas_core::Analysis {
    analyze(program, &CheckConfig::default())
}

#[test]
fn generic_identity_is_usable_at_two_types() {
    let program = program(vec![
        func("id")
            .generic("T")
            .param("x", ty("T"))
            .returns(ty("T"))
            .body(block(vec![], Some(ident("x"))))
            .item(),
        main_with(vec![
            let_("a", call(ident("id"), vec![int(1)])),
            let_("b", call(ident("id"), vec![boolean(true)])),
        ]),
    ]);

    let analysis = analyze_default(&program);
    assert!(analysis.ok(), "{:?} {:?}", analysis.type_errors, analysis.ownership_errors);
}

#[test]
fn use_after_move_is_reported_once() {
    let program = program(vec![
        consume(),
        main_with(vec![
            let_("x", int(5)),
            let_("y", ident("x")),
            expr_stmt(call(ident("consume"), vec![ident("x")])),
        ]),
    ]);

    let analysis = analyze_default(&program);
    assert!(analysis.type_errors.is_empty(), "{:?}", analysis.type_errors);
    assert_eq!(analysis.ownership_errors.len(), 1);
    let err = &analysis.ownership_errors[0];
    assert!(err.message.contains("moved"), "unexpected error: {}", err.message);
    assert!(err.moved_at.is_some());
}

#[test]
fn borrowing_does_not_move_the_owner() {
    let program = program(vec![
        consume(),
        main_with(vec![
            let_("x", int(5)),
            let_("y", borrow(ident("x"))),
            expr_stmt(call(ident("consume"), vec![ident("x")])),
        ]),
    ]);

    let analysis = analyze_default(&program);
    assert!(analysis.ownership_errors.is_empty(), "{:?}", analysis.ownership_errors);
}

#[test]
fn branded_types_with_the_same_base_do_not_mix() {
    let program = program(vec![
        branded_alias("UserId", ty("u64")),
        branded_alias("OrderId", ty("u64")),
        func("f").param("u", ty("UserId")).body(block(vec![], None)).item(),
        func("g")
            .param("order", ty("OrderId"))
            .body(block(vec![expr_stmt(call(ident("f"), vec![ident("order")]))], None))
            .item(),
    ]);

    let analysis = analyze_default(&program);
    assert!(!analysis.type_ok);
    assert_eq!(analysis.type_errors.len(), 1);
    let err = &analysis.type_errors[0];
    assert_eq!(err.category, ErrorCategory::Type);
    assert!(err.message.contains("branded"), "unexpected error: {}", err.message);
    assert!(analysis.branded_types.contains_key("UserId"));
    assert!(analysis.branded_types.contains_key("OrderId"));
}

#[test]
fn move_on_one_branch_is_forgotten_after_the_join() {
    let program = program(vec![
        consume(),
        func("main")
            .param("cond", ty("bool"))
            .body(block(
                vec![
                    let_("x", int(5)),
                    expr_stmt(if_(
                        ident("cond"),
                        block(vec![expr_stmt(call(ident("consume"), vec![ident("x")]))], None),
                        Some(block_expr(block(vec![], None))),
                    )),
                    expr_stmt(call(ident("consume"), vec![ident("x")])),
                ],
                None,
            ))
            .item(),
    ]);

    let analysis = analyze_default(&program);
    assert!(analysis.ok(), "{:?} {:?}", analysis.type_errors, analysis.ownership_errors);
}

#[test]
fn self_recursion_is_monomorphic() {
    let body = if_(
        binary(BinOp::Le, ident("n"), int(1)),
        block(vec![], Some(int(1))),
        Some(block_expr(block(
            vec![],
            Some(binary(
                BinOp::Mul,
                ident("n"),
                call(ident("rec"), vec![binary(BinOp::Sub, ident("n"), int(1))]),
            )),
        ))),
    );
    let program = program(vec![
        func("rec")
            .param("n", ty("i32"))
            .returns(ty("i32"))
            .body(block(vec![], Some(body)))
            .item(),
    ]);

    let mut checker = TypeChecker::new();
    assert!(checker.check_program(&program), "{:?}", checker.errors());
    let rec = checker.binding("rec").map(|s| s.to_string());
    assert_eq!(rec.as_deref(), Some("fn(i32) -> i32"));
}
