use assert_cmd::Command;
use predicates::str::{contains, diff};

fn backstep() -> Command {
    Command::cargo_bin("backstep").unwrap()
}

#[test]
fn runs_without_arguments() {
    backstep().assert().success();
}

#[test]
fn runs_subroutine() {
    backstep()
        .arg("run")
        .arg("tests/files/subroutine.s")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("Halted"))
        .stdout(contains("R2 42"))
        .stdout(contains("R1 0"))
        .stdout(contains("PC 5"))
        .stdout(contains("STACK []"));
}

#[test]
fn runs_path_without_subcommand() {
    backstep()
        .arg("tests/files/subroutine.s")
        .assert()
        .success()
        .stdout(contains("Halted"))
        .stdout(contains("Completed"));
}

#[test]
fn condition_codes_pass() {
    backstep()
        .arg("run")
        .arg("tests/files/condition_codes.s")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("R7 0"))
        .stdout(contains("R2 128"))
        .stdout(contains("FLAGS Z0 C0 N1 V1"));
}

#[test]
fn step_limit_from_environment() {
    backstep()
        .arg("run")
        .arg("tests/files/forever.s")
        .env("BACKSTEP_STEP_LIMIT", "7")
        .assert()
        .success()
        .stdout(contains("step limit reached"));

    // 7 instructions: `add` runs 4 times
    backstep()
        .arg("run")
        .arg("tests/files/forever.s")
        .arg("--minimal")
        .env("BACKSTEP_STEP_LIMIT", "7")
        .env("BACKSTEP_HISTORY", "0")
        .assert()
        .success()
        .stdout(contains("R0 4"));
}

#[test]
fn rejects_undefined_label() {
    backstep()
        .arg("check")
        .arg("tests/files/bad_label.s")
        .assert()
        .failure()
        .stderr(contains("never defined"));
}

#[test]
fn rejects_malformed_literal() {
    backstep()
        .arg("run")
        .arg("tests/files/bad_literal.s")
        .assert()
        .failure()
        .stderr(contains("invalid literal"));
}

#[test]
fn checks_valid_file() {
    backstep()
        .arg("check")
        .arg("tests/files/subroutine.s")
        .assert()
        .success()
        .stdout(contains("no errors found"));
}

#[test]
fn formats_file() {
    backstep()
        .arg("fmt")
        .arg("tests/files/unformatted.s")
        .assert()
        .success()
        .stdout(diff("start: ; entry\n mov r0, 16\n add r0, 1\n\n;done\n hlt\n"));
}

#[test]
fn missing_file() {
    backstep()
        .arg("run")
        .arg("tests/files/does_not_exist.s")
        .assert()
        .failure();
}
