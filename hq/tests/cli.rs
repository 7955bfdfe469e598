//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hq(temp_dir: &TempDir) -> Command {
    let config = temp_dir.path().join("habitquest.yml");
    std::fs::write(
        &config,
        format!(
            "storage:\n  database-path: {}\n",
            temp_dir.path().join("hq.db").display()
        ),
    )
    .expect("Failed to write config");

    let mut cmd = Command::cargo_bin("hq").expect("binary built");
    cmd.env("XDG_DATA_HOME", temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("hq")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("add-task"))
        .stdout(predicate::str::contains("leaderboard"))
        .stdout(predicate::str::contains("Logs are written to"));
}

#[test]
fn test_add_and_complete_task() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    hq(&temp_dir)
        .args(["add-task", "Drink water", "--xp", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Drink water"));

    let output = hq(&temp_dir)
        .args(["tasks", "--format", "json"])
        .output()
        .expect("run tasks");
    let views: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let id = views[0]["task"]["id"].as_str().expect("task id").to_string();

    hq(&temp_dir)
        .args(["complete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("+100 XP"))
        .stdout(predicate::str::contains("LEVEL UP"));

    hq(&temp_dir).args(["complete", &id]).assert().failure();
}

#[test]
fn test_plan_without_api_key_fails_fast() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = temp_dir.path().join("habitquest.yml");
    let yaml = format!(
        "ai:\n  api-key-env: HQ_TEST_KEY_NEVER_SET\nstorage:\n  database-path: {}\n",
        temp_dir.path().join("hq.db").display()
    );
    std::fs::write(&config, yaml).expect("Failed to write config");

    Command::cargo_bin("hq")
        .expect("binary built")
        .env("XDG_DATA_HOME", temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("HQ_TEST_KEY_NEVER_SET"));
}
