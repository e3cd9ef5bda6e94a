//! CLI-only smoke tests that don't require a container engine.

use assert_cmd::Command;
use predicates::prelude::*;

fn imagetest() -> Command {
    let mut cmd = Command::cargo_bin("imagetest").unwrap();
    for var in [
        "IMAGE_NAME",
        "RUNTIME_IMAGE_NAME",
        "OPENSHIFT_ONLY",
        "DEBUG",
        "TEST_DIR",
        "IMAGETEST_RUNTIME",
        "S2I",
        "IMAGETEST_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn smoke_help_lists_flags() {
    imagetest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--image-name"))
        .stdout(predicate::str::contains("--remote-only"))
        .stdout(predicate::str::contains("OPENSHIFT_ONLY"));
}

#[test]
fn smoke_list_prints_declaration_order() {
    let output = imagetest().arg("--list").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let names: Vec<&str> = stdout.lines().collect();

    assert_eq!(names.len(), 20);
    assert_eq!(names.first(), Some(&"console-csharp"));
    assert_eq!(names.last(), Some(&"dev-mode-sources"));
    let pack = names.iter().position(|n| *n == "pack").unwrap();
    let tools = names.iter().position(|n| *n == "tools").unwrap();
    assert!(pack < tools);
}

#[test]
fn smoke_remote_only_from_environment() {
    imagetest()
        .env("OPENSHIFT_ONLY", "true")
        .arg("--list")
        .assert()
        .success()
        .stdout("remote-repository\n");
}

#[test]
fn smoke_empty_image_name_is_a_setup_failure() {
    imagetest()
        .args(["--image-name", "", "--list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("image name must not be empty"));
}

#[test]
fn smoke_unknown_scenario_is_a_setup_failure() {
    imagetest()
        .args(["--scenario", "no-such-scenario", "--list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown scenario"));
}

#[test]
fn smoke_missing_engine_is_a_setup_failure() {
    imagetest()
        .env("IMAGETEST_RUNTIME", "podman")
        .env("PATH", "")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("All tests passed.").not());
}

#[cfg(unix)]
#[test]
fn smoke_unreachable_daemon_is_a_setup_failure() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let podman = dir.path().join("podman");
    std::fs::write(
        &podman,
        "#!/bin/sh\nif [ \"$1\" = --version ]; then echo 'podman version 5.2.0'; exit 0; fi\necho 'Cannot connect to Podman socket' >&2\nexit 125\n",
    )
    .unwrap();
    std::fs::set_permissions(&podman, std::fs::Permissions::from_mode(0o755)).unwrap();

    imagetest()
        .env("IMAGETEST_RUNTIME", "podman")
        .env("PATH", dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not responding"))
        .stdout(predicate::str::contains("=== Start").not());
}
