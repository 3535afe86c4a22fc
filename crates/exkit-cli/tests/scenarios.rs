use std::fs;
use std::process::ExitCode;

use exkit_cli::{ContextOptions, OutputFormat, RunOutcome, Scenario, run_main};
use exkit_core::{DebugLevel, Sink, StackFrame};
use exkit_error::ErrorKind;
use pretty_assertions::assert_eq;

fn quiet() -> ContextOptions {
    ContextOptions::new().with_debug_level(DebugLevel::None)
}

fn run(opts: &ContextOptions, scenario: Scenario) -> (RunOutcome, String, ExitCode, String) {
    let (sink, buffer) = Sink::buffer();
    let outcome = run_main(opts, scenario, sink).unwrap();
    let mut stdout = Vec::new();
    let code = outcome.report(&mut stdout).unwrap();
    let stdout = String::from_utf8(stdout).unwrap();
    (outcome, stdout, code, buffer.contents())
}

#[test]
fn handled_scenario_returns_composed_value() {
    let (_, stdout, code, stderr) = run(&quiet(), Scenario::Handled);
    assert_eq!(stdout, "(handled)(cleanup)\n");
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(stderr, "");
}

#[test]
fn nested_scenario_recovers_in_outer_dispatcher() {
    let (_, stdout, code, _) = run(&quiet(), Scenario::Nested);
    assert_eq!(stdout, "recovered: cannot open file\n");
    assert_eq!(code, ExitCode::SUCCESS);
}

#[test]
fn panic_scenario_is_normalized() {
    let (_, stdout, code, _) = run(&quiet(), Scenario::Panic);
    assert!(stdout.starts_with("recovered from panic: index out of bounds"));
    assert_eq!(code, ExitCode::SUCCESS);
}

#[test]
fn cascade_scenario_delivers_merged_failure() {
    let opts = quiet().with_exit_code(7);
    let (outcome, stdout, code, stderr) = run(&opts, Scenario::Cascade);
    assert_eq!(stdout, "");
    assert_eq!(code, ExitCode::from(7));
    assert_eq!(
        stderr,
        "io.open: cannot open file\n  | cannot release lock\n  id = E_OPEN\n  path = /etc/exkit/settings.toml\n"
    );
    assert!(outcome.result.is_err());
}

#[test]
fn cascade_stack_holds_both_raise_sites() {
    let opts = ContextOptions::new().with_debug_level(DebugLevel::Stack);
    let (outcome, _, _, stderr) = run(&opts, Scenario::Cascade);
    let error = outcome.result.unwrap_err();
    let frames: Vec<_> = error
        .stack()
        .unwrap()
        .iter()
        .filter_map(StackFrame::activation)
        .collect();
    assert_eq!(frames, vec!["cascade", "open_settings", "cascade", "release_lock"]);
    assert!(stderr.contains("    at exkit_cli::scenario::release_lock at "));
}

#[test]
fn unhandled_scenario_as_json() {
    let opts = quiet().with_format(OutputFormat::Json);
    let (_, _, code, stderr) = run(&opts, Scenario::Unhandled);
    assert_eq!(code, ExitCode::from(255));
    assert_eq!(stderr.lines().count(), 1);
    assert!(stderr.contains("\"kind\":\"io.open\""));
    assert!(stderr.contains("\"id\":\"E_OPEN\""));
}

#[test]
fn config_file_sets_exit_code_and_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exkit.toml");
    fs::write(
        &path,
        r#"
debug_level = "none"
exit_code = 9

[[kinds]]
name = "io"
parent = "runtime"
"#,
    )
    .unwrap();

    let (outcome, _, code, _) = run(&ContextOptions::new().with_config(&path), Scenario::Unhandled);
    assert_eq!(code, ExitCode::from(9));
    assert!(outcome.result.unwrap_err().stack().is_none());
}

#[test]
fn invalid_config_is_a_setup_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exkit.toml");
    fs::write(&path, "verbosity = 3\n").unwrap();

    let err = run_main(
        &ContextOptions::new().with_config(&path),
        Scenario::Handled,
        Sink::buffer().0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

fn exkit(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_exkit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn binary_keeps_dispatched_panics_quiet() {
    let output = exkit(&["panic", "--debug-level", "none"]);
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("panicked at"), "{stderr}");
}

#[test]
fn binary_clamps_out_of_range_exit_code() {
    let output = exkit(&["unhandled", "--debug-level", "none", "--exit-code", "256"]);
    assert_eq!(output.status.code(), Some(255));
}
