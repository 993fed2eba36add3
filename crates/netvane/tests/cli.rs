use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn netvane_in(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("netvane").unwrap();
    cmd.current_dir(dir);
    cmd.arg("--bundled-dir").arg(dir.join("bundled_plugins"));
    cmd
}

#[test]
fn list_with_no_plugins() {
    let dir = tempdir().unwrap();
    netvane_in(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins found."));
}

#[test]
fn list_shows_discovered_plugins() {
    let dir = tempdir().unwrap();
    let plugin_dir = dir.path().join("plugins/hello");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(
        plugin_dir.join("manifest.json"),
        r#"{"id": "hello", "name": "Hello", "version": "1.0.0", "entry_point": "hello-factory"}"#,
    )
    .unwrap();

    netvane_in(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains("discovered"));
}

#[test]
fn enable_persists_across_invocations() {
    let dir = tempdir().unwrap();
    let plugin_dir = dir.path().join("plugins/keeper");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(
        plugin_dir.join("manifest.json"),
        r#"{"id": "keeper", "name": "Keeper", "version": "1.0.0", "entry_point": "keeper-factory"}"#,
    )
    .unwrap();

    netvane_in(dir.path())
        .args(["enable", "keeper"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled"));

    netvane_in(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled"));
}

#[test]
fn enabling_an_unknown_plugin_fails() {
    let dir = tempdir().unwrap();
    netvane_in(dir.path())
        .args(["enable", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not registered"));
}
