use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use veritas_ast::Program;
use veritas_ast::build::*;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("veritas-cli-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn write_program(dir: &PathBuf, program: &Program) -> PathBuf {
    let path = dir.join("main.json");
    let json = serde_json::to_string(program).expect("serialize program");
    fs::write(&path, json).expect("write program");
    path
}

fn veritas(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_veritas"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run veritas")
}

fn double_move() -> Program {
    program(vec![
        func("main")
            .body(block(
                vec![let_("x", int(1)), let_("y", ident("x")), let_("z", ident("x"))],
                None,
            ))
            .item(),
    ])
}

#[test]
fn clean_program_exits_successfully() {
    let dir = scratch("clean");
    let input = write_program(
        &dir,
        &program(vec![func("main").returns(ty("i32")).body(block(vec![], Some(int(0)))).item()]),
    );

    let out = veritas(&["check", input.to_str().expect("utf-8 path")]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn json_report_carries_ownership_errors() {
    let dir = scratch("json");
    let input = write_program(&dir, &double_move());

    let out = veritas(&["check", input.to_str().expect("utf-8 path"), "--format", "json"]);
    assert!(!out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on stdout");
    assert_eq!(report["ok"], false);
    assert_eq!(report["ownership_errors"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["type_errors"].as_array().map(Vec::len), Some(0));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn manifest_and_flags_can_disable_the_ownership_pass() {
    let dir = scratch("manifest");
    let input = write_program(&dir, &double_move());
    let path = input.to_str().expect("utf-8 path");

    let out = veritas(&["check", path, "--no-ownership"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    fs::write(dir.join("veritas.toml"), "[check]\nownership = false\n").expect("write manifest");
    let out = veritas(&["check", path]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn human_output_names_the_error() {
    let dir = scratch("human");
    let input = write_program(&dir, &double_move());

    let out = veritas(&["check", input.to_str().expect("utf-8 path")]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("use of moved value"), "{stderr}");
    let _ = fs::remove_dir_all(&dir);
}
