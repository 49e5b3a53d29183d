use proptest::prelude::*;
use veritas_ast::build::*;
use veritas_ast::{Program, Stmt};
use veritas_core::OwnershipChecker;

fn run(stmts: Vec<Stmt>) -> OwnershipChecker {
    let program = program(vec![
        func("consume").param("v", ty("i32")).body(block(vec![], None)).item(),
        func("main").param("cond", ty("bool")).body(block(stmts, None)).item(),
    ]);
    check(&program)
}

fn check(program: &Program) -> OwnershipChecker {
    let mut checker = OwnershipChecker::new();
    checker.check_program(program);
    checker
}

fn consume(name: &str) -> Stmt {
    expr_stmt(call(ident("consume"), vec![ident(name)]))
}

/// `let fN = N;` statements that never mention `x`.
fn filler(count: usize, offset: usize) -> Vec<Stmt> {
    (0..count)
        .map(|i| let_(&format!("f{}", i + offset), int(i as u64)))
        .collect()
}

#[test]
fn moved_in_both_branches_stays_moved() {
    let checker = run(vec![
        let_("x", int(1)),
        expr_stmt(if_(
            ident("cond"),
            block(vec![consume("x")], None),
            Some(block_expr(block(vec![consume("x")], None))),
        )),
        consume("x"),
    ]);
    assert_eq!(checker.errors().len(), 1);
    assert!(checker.errors()[0].message.contains("use of moved value: `x`"));
}

#[test]
fn match_arms_join_like_branches() {
    let checker = run(vec![
        let_("x", int(1)),
        expr_stmt(match_(
            ident("cond"),
            vec![
                arm(pat_bool(true), call(ident("consume"), vec![ident("x")])),
                arm(pat_bool(false), unit()),
            ],
        )),
        consume("x"),
    ]);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn mutable_borrow_excludes_other_borrows() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", borrow_mut(ident("x"))),
        let_("s", borrow(ident("x"))),
    ]);
    assert_eq!(checker.errors().len(), 1);
    assert_eq!(
        checker.errors()[0].message,
        "cannot borrow `x` as immutable, already borrowed as mutable"
    );
}

#[test]
fn shared_borrows_coexist() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", borrow(ident("x"))),
        let_("s", borrow(ident("x"))),
    ]);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn borrows_end_at_the_join_after_a_branch() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", borrow(ident("x"))),
        expr_stmt(if_(ident("cond"), block(vec![], None), None)),
        let_("m", borrow_mut(ident("x"))),
    ]);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn temporary_borrows_end_with_their_statement() {
    let checker = run(vec![
        let_("x", int(1)),
        expr_stmt(borrow_mut(ident("x"))),
        let_("s", borrow(ident("x"))),
    ]);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn inner_shadow_does_not_end_an_outer_borrow() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", borrow_mut(ident("x"))),
        expr_stmt(block_expr(block(vec![let_("r", int(2))], None))),
        let_("s", borrow_mut(ident("x"))),
    ]);
    assert_eq!(checker.errors().len(), 1, "{:?}", checker.errors());
    assert_eq!(checker.errors()[0].message, "cannot borrow `x` as mutable, already borrowed");
}

#[test]
fn borrow_inside_a_tuple_is_held_by_the_binding() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("t", tuple(vec![borrow_mut(ident("x")), int(0)])),
        let_("s", borrow_mut(ident("x"))),
    ]);
    assert_eq!(checker.errors().len(), 1, "{:?}", checker.errors());
    assert_eq!(checker.errors()[0].message, "cannot borrow `x` as mutable, already borrowed");
}

#[test]
fn borrow_passed_through_a_call_is_held_by_the_binding() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", call(ident("wrap"), vec![borrow_mut(ident("x"))])),
        let_("s", borrow(ident("x"))),
    ]);
    assert_eq!(checker.errors().len(), 1, "{:?}", checker.errors());
    assert_eq!(
        checker.errors()[0].message,
        "cannot borrow `x` as immutable, already borrowed as mutable"
    );
}

#[test]
fn reassigned_holder_keeps_the_new_borrow() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("r", int(0)),
        assign(ident("r"), tuple(vec![borrow_mut(ident("x"))])),
        let_("s", borrow(ident("x"))),
    ]);
    assert_eq!(checker.errors().len(), 1, "{:?}", checker.errors());
}

#[test]
fn statements_inside_an_initializer_block_take_temporary_borrows() {
    let checker = run(vec![
        let_("x", int(1)),
        let_("y", int(2)),
        let_(
            "v",
            block_expr(block(
                vec![expr_stmt(borrow_mut(ident("x")))],
                Some(borrow(ident("y"))),
            )),
        ),
        let_("s", borrow_mut(ident("x"))),
        let_("t", borrow_mut(ident("y"))),
    ]);
    assert_eq!(checker.errors().len(), 1, "{:?}", checker.errors());
    assert!(checker.errors()[0].message.contains("`y` as mutable"));
}

#[test]
fn reassignment_revives_a_moved_binding() {
    let checker = run(vec![
        let_("x", int(1)),
        consume("x"),
        assign(ident("x"), int(2)),
        consume("x"),
    ]);
    assert!(checker.errors().is_empty(), "{:?}", checker.errors());
}

#[test]
fn functions_are_checked_independently() {
    let program = program(vec![
        func("a")
            .param("x", ty("i32"))
            .body(block(vec![let_("y", ident("x")), let_("z", ident("x"))], None))
            .item(),
        func("b")
            .param("x", ty("i32"))
            .body(block(vec![let_("y", ident("x"))], None))
            .item(),
    ]);
    let checker = check(&program);
    assert_eq!(checker.errors().len(), 1);
}

proptest! {
    #[test]
    fn use_after_unconditional_move_always_errors(before in 0usize..4, after in 0usize..4) {
        let mut stmts = vec![let_("x", int(5))];
        stmts.extend(filler(before, 0));
        stmts.push(let_("y", ident("x")));
        stmts.extend(filler(after, before));
        stmts.push(consume("x"));

        let checker = run(stmts);
        prop_assert_eq!(checker.errors().len(), 1);
        prop_assert!(checker.errors()[0].message.contains("moved"));
    }

    #[test]
    fn use_after_borrow_never_errors(before in 0usize..4, after in 0usize..4, mutable in any::<bool>()) {
        let reference = if mutable { borrow_mut(ident("x")) } else { borrow(ident("x")) };
        let mut stmts = vec![let_("x", int(5))];
        stmts.extend(filler(before, 0));
        stmts.push(let_("y", reference));
        stmts.extend(filler(after, before));
        stmts.push(consume("x"));

        let checker = run(stmts);
        prop_assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }
}
