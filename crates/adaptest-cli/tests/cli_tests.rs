//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const SAMPLE_CATALOG: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../catalogs/dental-sample.json"
);

fn adaptest() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("adaptest").unwrap();
    cmd.env_remove("ADAPTEST_CATALOG")
        .env_remove("ADAPTEST_STORE_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// A config pointing at the sample catalog and a session dir inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("adaptest.toml");
    let sessions = dir.join("sessions");
    std::fs::write(
        &path,
        format!(
            "catalog = {:?}\n\n[store]\ntype = \"json_dir\"\npath = {:?}\n",
            SAMPLE_CATALOG,
            sessions.to_string_lossy()
        ),
    )
    .unwrap();
    path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn start_session(config: &Path, user: &str) -> Value {
    json_stdout(
        adaptest()
            .arg("--config")
            .arg(config)
            .args(["start", "--user", user, "--json"]),
    )
}

#[test]
fn validate_sample_catalog() {
    adaptest()
        .args(["validate", "--catalog", SAMPLE_CATALOG])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 domains, 26 questions"))
        .stdout(predicate::str::contains("Catalog valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thin.toml");
    std::fs::write(
        &path,
        r#"
name = "Thin"

[[domains]]
code = "PHARMACOLOGY"
is_critical = true

[[questions]]
id = 1
domain = "PHARMACOLOGY"
stem = "Only question"
options = ["a", "b", "c", "d", "e"]
correct_answer_index = 0
irt_params = { difficulty = 2.5, discrimination = 1.5, guessing = 0.2 }
"#,
    )
    .unwrap();

    adaptest()
        .args(["validate", "--catalog"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("difficulty 2.5 is outside"))
        .stdout(predicate::str::contains("critical domain"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_rejects_unscorable_question() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.toml");
    std::fs::write(
        &path,
        r#"
[[domains]]
code = "ANATOMY"

[[questions]]
id = 4
domain = "ANATOMY"
stem = "Three options only"
options = ["a", "b", "c"]
correct_answer_index = 0
irt_params = { difficulty = 1.0, discrimination = 1.5, guessing = 0.2 }
"#,
    )
    .unwrap();

    adaptest()
        .args(["validate", "--catalog"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("has 3 options"))
        .stderr(predicate::str::contains("catalog cannot be loaded"));

    adaptest()
        .args(["list-domains", "--catalog"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid catalog"));
}

#[test]
fn validate_rejects_unknown_domain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"domains": [], "questions": [{"id": 1, "domain": "NOPE",
            "options": ["a", "b", "c", "d", "e"],
            "correct_answer_index": 0,
            "irt_params": {"difficulty": 1.0, "discrimination": 1.5, "guessing": 0.2}}]}"#,
    )
    .unwrap();

    adaptest()
        .args(["validate", "--catalog"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("NOPE"));
}

#[test]
fn validate_nonexistent_file() {
    adaptest()
        .args(["validate", "--catalog", "nonexistent.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn list_domains_shows_table() {
    adaptest()
        .args(["list-domains", "--catalog", SAMPLE_CATALOG])
        .assert()
        .success()
        .stdout(predicate::str::contains("PHARMACOLOGY"))
        .stdout(predicate::str::contains("Ethics and Jurisprudence"))
        .stdout(predicate::str::contains("26 questions"));
}

#[test]
fn missing_catalog_is_explained() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("adaptest.toml");
    std::fs::write(&config, "[store]\ntype = \"memory\"\n").unwrap();

    adaptest()
        .arg("--config")
        .arg(&config)
        .arg("list-domains")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no catalog given"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created adaptest.toml"))
        .stdout(predicate::str::contains("Created catalogs/sample.json"));

    assert!(dir.path().join("adaptest.toml").exists());

    // The generated catalog is valid and the config is picked up from CWD.
    adaptest()
        .current_dir(dir.path())
        .args(["validate", "--catalog", "catalogs/sample.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalog valid"));
    adaptest()
        .current_dir(dir.path())
        .arg("list-domains")
        .assert()
        .success()
        .stdout(predicate::str::contains("RADIOLOGY"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("adaptest.toml"), "# existing").unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(dir.path().join("adaptest.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn session_flow_through_cli() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let start = start_session(&config, "alice");
    let session_id = start["session"]["id"].as_str().unwrap().to_string();
    let starting = start["starting_questions"].as_array().unwrap();
    assert_eq!(starting.len(), 5);
    assert!(starting[0].get("correct_answer_index").is_none());
    let first = starting[0]["id"].as_u64().unwrap().to_string();

    // One active session per user.
    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["start", "--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflict"));

    let answer = json_stdout(adaptest().arg("--config").arg(&config).args([
        "answer",
        "--session",
        &session_id,
        "--question",
        &first,
        "--answer",
        "0",
        "--json",
    ]));
    assert_eq!(answer["progress"]["answered"], 1);
    assert_eq!(answer["should_complete"], false);
    assert!(answer["next_question"].is_object());

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["answer", "--session", &session_id, "--question", &first, "--answer", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already answered"));

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["results", "--session", &session_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status is in_progress"));

    let completed = json_stdout(adaptest().arg("--config").arg(&config).args([
        "complete",
        "--session",
        &session_id,
        "--json",
    ]));
    assert_eq!(completed["total_questions"], 1);
    assert_eq!(completed["status"], "completed");

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["results", "--session", &session_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Readiness:"));

    let md = dir.path().join("results.md");
    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["results", "--session", &session_id, "--format", "markdown", "--output"])
        .arg(&md)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&md)
        .unwrap()
        .contains("# Diagnostic Results"));

    let html = dir.path().join("results.html");
    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["results", "--session", &session_id, "--format", "html", "--output"])
        .arg(&html)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&html).unwrap().contains("<html"));

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["answer", "--session", &session_id, "--question", "1", "--answer", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status is completed"));

    // Completion frees the user to start again.
    start_session(&config, "alice");
}

#[test]
fn abandon_then_restart() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let start = start_session(&config, "bob");
    let session_id = start["session"]["id"].as_str().unwrap().to_string();

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["abandon", "--session", &session_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("abandoned"));

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["complete", "--session", &session_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status is abandoned"));

    start_session(&config, "bob");
}

#[test]
fn domain_session_limited_to_focus() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let start = json_stdout(adaptest().arg("--config").arg(&config).args([
        "start",
        "--user",
        "carol",
        "--type",
        "domain",
        "--focus",
        "RADIOLOGY",
        "--json",
    ]));
    let starting = start["starting_questions"].as_array().unwrap();
    assert_eq!(starting.len(), 1);
    assert_eq!(starting[0]["domain"], "RADIOLOGY");

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["start", "--user", "dave", "--type", "domain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("focus domain"));
}

#[test]
fn session_rejects_a_different_catalog() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let mut catalog: Value =
        serde_json::from_str(&std::fs::read_to_string(SAMPLE_CATALOG).unwrap()).unwrap();
    catalog["version"] = Value::from("2099.1");
    let revised = dir.path().join("revised.json");
    std::fs::write(&revised, catalog.to_string()).unwrap();

    let start = start_session(&config, "hana");
    let session_id = start["session"]["id"].as_str().unwrap().to_string();
    let first = start["starting_questions"][0]["id"].as_u64().unwrap().to_string();

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["answer", "--session", &session_id, "--question", &first, "--answer", "0"])
        .arg("--catalog")
        .arg(&revised)
        .assert()
        .failure()
        .stderr(predicate::str::contains("belongs to catalog"));

    adaptest()
        .arg("--config")
        .arg(&config)
        .args(["answer", "--session", &session_id, "--question", &first, "--answer", "0"])
        .assert()
        .success();
}

#[test]
fn unknown_session_is_not_found() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    adaptest()
        .arg("--config")
        .arg(&config)
        .args([
            "results",
            "--session",
            "00000000-0000-0000-0000-000000000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session not found"));
}

#[test]
fn simulate_prints_summary_and_saves_report() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sim.json");

    adaptest()
        .args(["simulate", "--catalog", SAMPLE_CATALOG, "--examinees", "5", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Mean absolute error"))
        .stdout(predicate::str::contains("sim-005"));

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 5);
    assert_eq!(report["failed"], 0);
}

#[test]
fn simulate_rejects_bad_limits() {
    adaptest()
        .args([
            "simulate",
            "--catalog",
            SAMPLE_CATALOG,
            "--min-questions",
            "20",
            "--max-questions",
            "5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_questions"));
}
