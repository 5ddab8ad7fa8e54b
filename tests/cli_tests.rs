//! Binary-level contract tests. None of these require a live instance: they
//! exercise parsing, credential resolution, and the exit-code mapping.

use assert_cmd::Command;

fn jobwarden() -> Command {
    let mut cmd = Command::cargo_bin("jobwarden").unwrap();
    // Keep ambient credentials and config out of the assertions.
    cmd.env_remove("JOBWARDEN_SQL_USER");
    cmd.env_remove("JOBWARDEN_SQL_PASSWORD");
    cmd.env_remove("JOBWARDEN_LOGIN");
    cmd
}

#[test]
fn help_describes_both_subcommands() {
    let assert = jobwarden().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("enforce"));
    assert!(output.contains("check"));
}

#[test]
fn version_flag_works() {
    jobwarden().arg("--version").assert().success();
}

#[test]
fn enforce_requires_an_instance() {
    jobwarden().arg("enforce").assert().failure().code(2);
}

#[test]
fn unknown_mode_is_a_usage_error() {
    jobwarden()
        .args(["enforce", "-i", "db01", "--mode", "yolo"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn invalid_address_is_fatal() {
    jobwarden()
        .args([
            "enforce",
            "-i",
            "db01:not-a-port",
            "--sql-user",
            "svc",
            "--sql-password",
            "pw",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn user_without_password_is_fatal() {
    jobwarden()
        .args(["enforce", "-i", "db01", "--sql-user", "svc"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_credential_skips_the_instance_and_exits_one() {
    // No credential resolves anywhere, so the client refuses before touching
    // the network; the instance is skipped and the run reports failures.
    jobwarden()
        .args(["enforce", "-i", "127.0.0.1:1", "--quiet"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn json_report_lands_on_stdout() {
    let assert = jobwarden()
        .args(["check", "-i", "127.0.0.1:1", "--json"])
        .assert()
        .failure()
        .code(1);
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&output).expect("stdout is a JSON report");
    assert_eq!(report["instances"][0]["outcome"], "skipped");
    assert_eq!(report["mode"], "preview");
}
