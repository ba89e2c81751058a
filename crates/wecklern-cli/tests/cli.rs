use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;

fn wecklern(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("wecklern").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn dismiss_then_step_publishes_a_palette_melody() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = json_output(wecklern(dir.path()).args(["dismiss", "--snooze", "30"]));
    assert_eq!(outcome["snooze_seconds"], 30);
    assert_eq!(
        outcome["melody_used"],
        serde_json::json!([60, -2, 62, -2, 64, -2, 65, -2])
    );

    let report = json_output(wecklern(dir.path()).args([
        "step",
        "--exploration-rate",
        "0",
        "--seed",
        "1",
    ]));
    assert_eq!(report["cold_start"], false);
    assert_eq!(report["action"], 0);
    assert_eq!(report["reward"], 0.5);
    assert_eq!(report["melody"], serde_json::json!([60, -2, 60, -2, 60, -2, 60, -2]));

    let shown = json_output(wecklern(dir.path()).arg("show"));
    assert_eq!(shown["steps"], 1);
    assert_eq!(shown["known_states"], 2);
    assert_eq!(shown["offered_melody"], "60, -2, 60, -2, 60, -2, 60, -2");

    assert!(dir.path().join("wecklern.agent.json").exists());
    assert!(dir.path().join("wecklern.history.jsonl").exists());
}

#[test]
fn step_without_dismissal_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();

    let report = json_output(wecklern(dir.path()).args(["step", "--seed", "2"]));
    assert_eq!(report["cold_start"], true);
    assert_eq!(report["reward"], 0.0);
}

#[test]
fn dismiss_accepts_explicit_melody() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = json_output(wecklern(dir.path()).args([
        "dismiss",
        "--snooze",
        "12",
        "--melody",
        "[67, -2, 67, -2]",
    ]));
    assert_eq!(outcome["melody_used"], serde_json::json!([67, -2, 67, -2]));
}

#[test]
fn dismiss_rejects_bad_melody() {
    let dir = tempfile::tempdir().unwrap();

    wecklern(dir.path())
        .args(["dismiss", "--snooze", "12", "--melody", "67, la"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("la"));
}

#[test]
fn ingest_resumes_where_it_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("dismissals.jsonl");
    std::fs::write(
        &events,
        "{\"id\":\"a\",\"snooze_seconds\":40}\n{\"id\":\"b\",\"snooze_seconds\":20,\"melody_used\":\"64, -2\"}\n",
    )
    .unwrap();

    let first = json_output(
        wecklern(dir.path())
            .args(["ingest", "--seed", "3", "--path"])
            .arg(&events),
    );
    assert_eq!(first["cursor"], 2);
    assert_eq!(first["steps"], 2);

    let second = json_output(wecklern(dir.path()).args(["ingest", "--path"]).arg(&events));
    assert_eq!(second["cursor"], 2);
    assert_eq!(second["steps"], 0);

    let shown = json_output(wecklern(dir.path()).arg("show"));
    assert_eq!(shown["steps"], 2);
    assert_eq!(shown["latest_outcome"]["snooze_seconds"], 20);
}

#[test]
fn ingest_reports_broken_line() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("dismissals.jsonl");
    std::fs::write(&events, "{\"snooze_seconds\":40}\n{oops\n").unwrap();

    wecklern(dir.path())
        .args(["ingest", "--path"])
        .arg(&events)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"));

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("wecklern.ingest.state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["cursor"], 1);
    assert!(state["last_error"].is_string());
}

#[test]
fn simulate_with_seed_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let args = ["simulate", "--episodes", "50", "--seed", "9"];

    let a = json_output(wecklern(dir.path()).args(args));
    let b = json_output(wecklern(dir.path()).args(args));

    assert_eq!(a, b);
    assert_eq!(a["episodes"], 50);
    assert!(a["final_exploration_rate"].as_f64().unwrap() < 1.0);
    assert_eq!(a["curve"].as_array().unwrap().len(), 50);
    assert!(a["final_greedy_action"].as_u64().unwrap() < 5);
    assert!(!dir.path().join("wecklern.agent.json").exists());
}

#[test]
fn simulate_summary_only_drops_curve() {
    let dir = tempfile::tempdir().unwrap();
    let summary = json_output(wecklern(dir.path()).args([
        "simulate",
        "--episodes",
        "5",
        "--seed",
        "1",
        "--summary-only",
    ]));
    assert!(summary.get("curve").is_none());
    assert_eq!(summary["episodes"], 5);
}

#[test]
fn analyze_reads_step_history() {
    let dir = tempfile::tempdir().unwrap();
    for snooze in ["50", "10", "30"] {
        wecklern(dir.path())
            .args(["dismiss", "--snooze", snooze])
            .assert()
            .success();
        wecklern(dir.path())
            .args(["step", "--seed", "4"])
            .assert()
            .success();
    }

    let report = json_output(wecklern(dir.path()).arg("analyze"));
    assert_eq!(report["episodes"], 3);
    assert!(report["proposal"].is_null());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    wecklern(dir.path())
        .args(["step", "--learning-rate", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("learning_rate"));
}
