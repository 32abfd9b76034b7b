use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("moviepedia")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("moviepedia")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Moviepedia"))
        .stdout(predicate::str::contains("--save-token"));
}

#[test]
fn save_token_requires_a_token() {
    Command::cargo_bin("moviepedia")
        .unwrap()
        .arg("--save-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a TMDB access token"));
}

#[test]
fn save_token_rejects_bad_account_id() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("moviepedia")
        .unwrap()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["--save-token", "token", "not-a-number"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid account id"));
}

#[cfg(target_os = "linux")]
#[test]
fn save_token_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("moviepedia")
        .unwrap()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--save-token", "secret-token", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved TMDB credentials"));

    let written =
        std::fs::read_to_string(dir.path().join("moviepedia").join("config.yaml")).unwrap();
    assert!(written.contains("secret-token"));
    assert!(written.contains("42"));
}
