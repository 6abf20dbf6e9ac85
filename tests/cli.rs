use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("talk2landing").unwrap();
    cmd.env_remove("TALK2LANDING_USER");
    cmd
}

#[test]
fn help_lists_commands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transcript"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("--json-logs"));
}

#[test]
fn transcript_help_shows_formats() {
    bin()
        .args(["transcript", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("srt"))
        .stdout(predicate::str::contains("--manual"));
}

#[test]
fn generate_without_user_is_rejected() {
    bin()
        .args(["generate", "dQw4w9WgXcQ"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user"));
}

#[test]
fn unknown_format_is_rejected() {
    bin()
        .args(["transcript", "dQw4w9WgXcQ", "--format", "vtt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
