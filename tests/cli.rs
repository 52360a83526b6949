use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const PROGRAM: &str = "VAR a, b\nPROGRAM demo BEGIN\n  a = 1 + 2\n  IF a b = a ENDIF\nEND.\n";

fn source_file(text: &str) -> NamedTempFile {
  let mut file = NamedTempFile::new().expect("temp file");
  file.write_all(text.as_bytes()).expect("write source");
  file
}

#[test]
fn compiles_a_file() {
  let file = source_file(PROGRAM);
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.arg(file.path());
  cmd
    .assert()
    .success()
    .stdout(
      predicate::str::starts_with("WARMST\tEQU $A01E\n")
        .and(predicate::str::contains("A:\tDC.W 0\n"))
        .and(predicate::str::contains("MAIN:\n"))
        .and(predicate::str::ends_with("\tEND MAIN\n")),
    );
}

#[test]
fn reads_standard_input() {
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.write_stdin(PROGRAM);
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains("\tBEQ L0\n"));
}

#[test]
fn flags_override_defaults() {
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.args(["--label-prefix", "LBL", "--dump-symbols"]);
  cmd.write_stdin(PROGRAM);
  cmd.assert().success().stdout(
    predicate::str::contains("\tBEQ LBL0\n")
      .and(predicate::str::ends_with("* A variable word\n* B variable word\n")),
  );
}

#[test]
fn config_file_is_layered() {
  let mut config = tempfile::Builder::new()
    .suffix(".toml")
    .tempfile()
    .expect("temp config");
  writeln!(config, "[codegen]\nruntime_header = false").expect("write config");

  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.arg("--config").arg(config.path());
  cmd.write_stdin(PROGRAM);
  cmd.assert().success().stdout(
    predicate::str::contains("WARMST")
      .not()
      .and(predicate::str::contains("MAIN:\n")),
  );
}

#[test]
fn interprets_with_input() {
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.args(["--interpret", "--input", "6,-7"]);
  cmd.write_stdin("READ(a, b)\nWRITE(a * b, a - b).");
  cmd.assert().success().stdout("-42\n13\n");
}

#[test]
fn errors_go_to_stderr_with_a_caret() {
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.write_stdin("PROGRAM p BEGIN\n  x = 1\nEND.");
  cmd.assert().failure().code(1).stdout("").stderr(
    predicate::str::contains("error: 2:3: undefined identifier X").and(predicate::str::contains("  x\n  ^")),
  );
}

#[test]
fn missing_file_fails() {
  let mut cmd = cargo_bin_cmd!("kissc");
  cmd.arg("/nonexistent/prog.kiss");
  cmd.assert().failure().code(1).stderr(predicate::str::starts_with("kissc: "));
}
