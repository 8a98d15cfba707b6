//! End-to-end tests for the approval workflow through the `tsa` binary.
//!
//! Drives the full pipeline: init → submit → send → review → report,
//! plus the post-completion reconciliation pass.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tsa_binary() -> String {
    env!("CARGO_BIN_EXE_tsa").to_string()
}

fn run_tsa(temp: &Path, args: &[&str]) -> Output {
    Command::new(tsa_binary())
        .env("TSA_DATABASE_PATH", temp.join("tsa.db"))
        .args(args)
        .output()
        .expect("failed to run tsa")
}

fn assert_success(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "tsa should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap_or(serde_json::Value::Null)
}

/// Seeds a team with one employee, a manager, and a fixed 10-hour project.
fn init_directory(temp: &Path, task_status: &str) {
    let seed = serde_json::json!({
        "teams": [{"id": 1, "name": "Platform", "lead_id": null, "manager_id": 2}],
        "users": [
            {"id": 1, "name": "Asha", "role": "employee", "team_id": 1},
            {"id": 2, "name": "Ravi", "role": "manager", "team_id": 1}
        ],
        "projects": [
            {"id": 10, "name": "Build", "billing": "fixed", "team_id": 1, "total_minutes": 600}
        ],
        "members": [{"project_id": 10, "user_id": 1}],
        "tasks": [{"id": 100, "project_id": 10, "title": "API", "status": task_status}]
    });
    std::fs::write(temp.join("seed.json"), seed.to_string()).unwrap();

    let output = run_tsa(
        temp,
        &["init", "--seed", temp.join("seed.json").to_str().unwrap()],
    );
    assert!(
        output.status.success(),
        "tsa init should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Submits one entry for 2024-01-02 and returns its id.
fn submit_entry(temp: &Path, clock: &str, activity: &str) -> String {
    let payload = serde_json::json!([{
        "project_id": 10,
        "task_id": null,
        "date": "2024-01-02",
        "duration": clock,
        "work_type": "development",
        "narration": "feature work",
        "activity": activity,
        "tracking": null
    }]);
    let file = temp.join("entries.json");
    std::fs::write(&file, payload.to_string()).unwrap();

    let output = run_tsa(
        temp,
        &[
            "submit",
            "--actor",
            "1",
            "--file",
            file.to_str().unwrap(),
            "--date",
            "2024-01-02",
        ],
    );
    let created = assert_success(&output);
    assert_eq!(created[0]["status"], "standup");
    created[0]["id"].as_str().unwrap().to_string()
}

fn approve(temp: &Path, id: &str) -> serde_json::Value {
    let output = run_tsa(
        temp,
        &["review", "--actor", "2", "--decision", "approve", id],
    );
    let outcomes = assert_success(&output);
    outcomes[0].clone()
}

#[test]
fn submit_send_review_report_roundtrip() {
    let temp = TempDir::new().unwrap();
    init_directory(temp.path(), "In Progress");

    let id = submit_entry(temp.path(), "06:00", "billable");

    let output = run_tsa(temp.path(), &["send", "--actor", "1", &id]);
    let outcomes = assert_success(&output);
    assert_eq!(outcomes[0]["status"], "pending");

    let outcome = approve(temp.path(), &id);
    assert_eq!(outcome["status"], "approved");

    let output = run_tsa(
        temp.path(),
        &[
            "report",
            "--user",
            "1",
            "--from",
            "2024-01-02",
            "--to",
            "2024-01-02",
        ],
    );
    let report = assert_success(&output);
    assert_eq!(report["days"][0]["billable"], "06:00");
    assert_eq!(report["total"], "06:00");
}

#[test]
fn second_approval_splits_when_the_budget_runs_out() {
    let temp = TempDir::new().unwrap();
    init_directory(temp.path(), "In Progress");

    let first = submit_entry(temp.path(), "06:00", "billable");
    run_tsa(temp.path(), &["send", "--actor", "1", &first]);
    approve(temp.path(), &first);

    let second = submit_entry(temp.path(), "05:00", "billable");
    run_tsa(temp.path(), &["send", "--actor", "1", &second]);
    let outcome = approve(temp.path(), &second);
    assert_eq!(outcome["status"], "approved");
    assert_eq!(outcome["note"], "Billable - within remaining hours");

    // The overflow hour landed in a split entry; totals reflect all 11h.
    let output = run_tsa(
        temp.path(),
        &[
            "report",
            "--user",
            "1",
            "--from",
            "2024-01-02",
            "--to",
            "2024-01-02",
        ],
    );
    let report = assert_success(&output);
    assert_eq!(report["total"], "11:00");
}

#[test]
fn reviewer_role_is_enforced() {
    let temp = TempDir::new().unwrap();
    init_directory(temp.path(), "In Progress");

    let id = submit_entry(temp.path(), "02:00", "billable");
    run_tsa(temp.path(), &["send", "--actor", "1", &id]);

    let output = run_tsa(
        temp.path(),
        &["review", "--actor", "1", "--decision", "approve", &id],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("reviewer"));
}

#[test]
fn reconcile_converts_after_completion() {
    let temp = TempDir::new().unwrap();
    init_directory(temp.path(), "Completed");

    let id = submit_entry(temp.path(), "03:00", "non_billable");
    run_tsa(temp.path(), &["send", "--actor", "1", &id]);
    approve(temp.path(), &id);

    let output = run_tsa(
        temp.path(),
        &["reconcile", "--actor", "2", "--project", "10"],
    );
    let report = assert_success(&output);
    assert_eq!(report["all_completed"], true);
    assert_eq!(report["converted"][0]["kind"], "full");
    assert_eq!(report["remaining_after_conversion"], "07:00");
}
