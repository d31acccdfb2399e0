//! CLI tests for the `pd` binary

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn pd(home: &TempDir) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("pd");
    // Keep the log file out of the real data directory
    cmd.env("HOME", home.path()).env("XDG_DATA_HOME", home.path());
    cmd
}

#[test]
fn test_topics_lists_catalog() {
    let home = TempDir::new().unwrap();
    pd(&home)
        .arg("topics")
        .assert()
        .success()
        .stdout(predicate::str::contains("party.input.added"))
        .stdout(predicate::str::contains("party.plan.updated"));
}

#[test]
fn test_graph_reports_acyclic() {
    let home = TempDir::new().unwrap();
    pd(&home)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("theme_agent"))
        .stdout(predicate::str::contains("Graph is acyclic"));
}

#[test]
fn test_graph_rejects_cyclic_config() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("cyclic.yml");
    std::fs::write(
        &config,
        r#"
classifier:
  dependencies:
    theme: { affects: [venue], priority: 1 }
    venue: { affects: [theme], priority: 2 }
    cake: { affects: [], priority: 3 }
    catering: { affects: [], priority: 3 }
    vendor: { affects: [], priority: 4 }
"#,
    )
    .unwrap();

    pd(&home)
        .args(["graph", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn test_classify_scores_categories() {
    let home = TempDir::new().unwrap();
    pd(&home)
        .args(["classify", "chocolate cake and pizza for 20 kids"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cake_agent"))
        .stdout(predicate::str::contains("catering_agent"))
        .stdout(predicate::str::contains("venue_agent"));
}

#[test]
fn test_run_prints_json_session() {
    let home = TempDir::new().unwrap();
    pd(&home)
        .args(["run", "-i", "jungle theme", "--settle-ms", "150", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"session_id\""))
        .stdout(predicate::str::contains("theme_agent"));
}

#[test]
fn test_run_requires_input() {
    let home = TempDir::new().unwrap();
    pd(&home).arg("run").assert().failure();
}
