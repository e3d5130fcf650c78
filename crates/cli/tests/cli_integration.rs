//! CLI integration tests for the `lgdesk` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout and
//! stderr. Networked commands talk to a fake authority served by `axum` on a
//! background runtime. Every command runs in an empty temporary directory so
//! no stray `lgdesk.toml` is picked up.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Helper: create a Command for the `lgdesk` binary in a clean directory.
fn lgdesk(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("lgdesk");
    cmd.current_dir(dir.path())
        .env_remove("LGDESK_BASE_URL")
        .env_remove("LGDESK_TOKEN")
        .env_remove("LGDESK_LOG");
    cmd
}

// ──────────────────────────────────────────────
// Fake authority
// ──────────────────────────────────────────────

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn record_json(id: u64) -> Value {
    json!({
        "id": id,
        "status": "Valid",
        "amount": "1000.00",
        "currency": "EUR",
        "expiry_date": "2025-01-01",
        "auto_renewal": false,
        "owner_contact": {"name": "Lea Brandt", "email": "lea@example.com"},
        "instructions": [{
            "id": 900,
            "serial_number": "ISS-900",
            "instruction_type": "issuance",
            "instruction_date": "2024-01-02",
            "created_at": "2024-01-02T09:00:00Z"
        }]
    })
}

async fn list_records(State(hits): State<Hits>) -> Json<Value> {
    hits.bump();
    Json(json!([record_json(42), record_json(43)]))
}

async fn get_record(State(hits): State<Hits>, Path(id): Path<u64>) -> (StatusCode, Json<Value>) {
    hits.bump();
    if id == 42 || id == 43 {
        (StatusCode::OK, Json(record_json(id)))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"detail": "LG record not found"})))
    }
}

async fn record_action(
    State(hits): State<Hits>,
    Path((id, action)): Path<(u64, String)>,
) -> (StatusCode, Json<Value>) {
    hits.bump();
    match action.as_str() {
        "extend" => {
            let mut updated = record_json(id);
            updated["expiry_date"] = json!("2025-06-01");
            if let Some(list) = updated["instructions"].as_array_mut() {
                list.push(json!({
                    "id": 901,
                    "serial_number": "EXT-901",
                    "instruction_type": "extension",
                    "instruction_date": "2024-06-01",
                    "created_at": "2024-06-01T12:00:00Z"
                }));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "lg_record": updated,
                    "latest_instruction_id": 901,
                    "message": "LG extended"
                })),
            )
        }
        "decrease-amount" => (
            StatusCode::ACCEPTED,
            Json(json!({"approval_request_id": 77, "message": "Queued for approval"})),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))),
    }
}

async fn mark_accessed(State(hits): State<Hits>, Path(_id): Path<u64>) -> Json<Value> {
    hits.bump();
    Json(json!({}))
}

async fn view_letter(State(hits): State<Hits>, Path(id): Path<u64>) -> Json<Value> {
    hits.bump();
    Json(json!({"signed_url": format!("https://docs.example.com/letters/{}.pdf", id)}))
}

/// Serve the fake authority on a background thread; returns its base URL.
fn spawn_authority(hits: Hits) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let app = Router::new()
                .route("/api/v1/lg-records/", get(list_records))
                .route("/api/v1/lg-records/{id}", get(get_record))
                .route("/api/v1/lg-records/{id}/{action}", post(record_action))
                .route(
                    "/api/v1/lg-records/instructions/{id}/mark-as-accessed-for-print",
                    post(mark_accessed),
                )
                .route(
                    "/api/v1/lg-records/instructions/{id}/view-letter",
                    get(view_letter),
                )
                .with_state(hits);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{}/api/v1", addr)
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    lgdesk(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Letter of Guarantee action desk"))
        .stdout(predicate::str::contains("toggle-auto-renewal"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    lgdesk(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lgdesk"));
}

// ──────────────────────────────────────────────
// 2. Offline catalog
// ──────────────────────────────────────────────

#[test]
fn catalog_for_valid_status_lists_lifecycle_actions() {
    let dir = TempDir::new().unwrap();
    lgdesk(&dir)
        .args(["catalog", "Valid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extend"))
        .stdout(predicate::str::contains("toggle-auto-renewal"));
}

#[test]
fn catalog_json_for_terminal_status() {
    let dir = TempDir::new().unwrap();
    let output = lgdesk(&dir)
        .args(["--output", "json", "catalog", "released"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["status"], "Released");
    assert_eq!(v["actions"], json!(["change_owner"]));
}

// ──────────────────────────────────────────────
// 3. Configuration and subscription errors
// ──────────────────────────────────────────────

#[test]
fn missing_base_url_fails() {
    let dir = TempDir::new().unwrap();
    lgdesk(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no authority configured"));
}

#[test]
fn unparseable_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("lgdesk.toml"), "[authority\nbase_url = 1").unwrap();
    lgdesk(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn json_errors_go_to_stderr_as_objects() {
    let dir = TempDir::new().unwrap();
    let output = lgdesk(&dir)
        .args(["--output", "json", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let v: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(v["error"].as_str().unwrap().contains("no authority configured"));
}

#[test]
fn expired_subscription_is_refused() {
    let dir = TempDir::new().unwrap();
    lgdesk(&dir)
        .env("LGDESK_BASE_URL", "http://127.0.0.1:9")
        .args(["--subscription", "expired", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("subscription expired"));
}

#[test]
fn grace_period_refuses_without_calling_the_authority() {
    let hits = Hits::default();
    let base = spawn_authority(hits.clone());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["--subscription", "grace", "extend", "42", "--expiry", "2025-06-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("grace period"));

    assert_eq!(hits.count(), 0);
}

// ──────────────────────────────────────────────
// 4. Against the fake authority
// ──────────────────────────────────────────────

#[test]
fn list_prints_records_with_their_actions() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("#42"))
        .stdout(predicate::str::contains("#43"))
        .stdout(predicate::str::contains("extend"));
}

#[test]
fn grace_period_still_reads_but_offers_nothing() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();

    let output = lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["--output", "json", "--subscription", "grace", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["actions"] == json!([])));
}

#[test]
fn show_lists_instruction_actions() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["show", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG #42"))
        .stdout(predicate::str::contains("ISS-900"))
        .stdout(predicate::str::contains("record-delivery"));
}

#[test]
fn show_unknown_record_fails_to_load() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["show", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not load LG records"));
}

#[test]
fn applied_extension_prints_notice_then_letter() {
    let hits = Hits::default();
    let base = spawn_authority(hits.clone());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["extend", "42", "--expiry", "2025-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[success] LG extended"))
        .stdout(predicate::str::contains(
            "Letter for instruction #901: https://docs.example.com/letters/901.pdf",
        ));

    // fetch, extend, mark accessed, view letter
    assert_eq!(hits.count(), 4);
}

#[test]
fn pending_decrease_reports_the_approval_request() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();

    let output = lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["--output", "json", "decrease-amount", "42", "--amount", "200"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["action"], "decrease_amount");
    assert_eq!(v["status"]["status"], "pending");
    assert_eq!(v["status"]["approval_request_id"], 77);
    assert!(v["notice"]["message"]
        .as_str()
        .unwrap()
        .ends_with("Approval request ID: 77"));
    assert!(v.get("letter").is_none());
}

#[test]
fn local_validation_failure_exits_1_with_field() {
    let hits = Hits::default();
    let base = spawn_authority(hits.clone());
    let dir = TempDir::new().unwrap();

    lgdesk(&dir)
        .env("LGDESK_BASE_URL", &base)
        .args(["extend", "42", "--expiry", "2024-12-31"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("(new_expiry_date)"));

    // only the initial fetch
    assert_eq!(hits.count(), 1);
}

#[test]
fn config_file_is_used() {
    let base = spawn_authority(Hits::default());
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("lgdesk.toml"),
        format!(
            "[authority]\nbase_url = \"{}\"\n\n[orchestrator]\nopen_letters = false\n",
            base
        ),
    )
    .unwrap();

    lgdesk(&dir)
        .args(["extend", "42", "--expiry", "2025-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[success]"))
        .stdout(predicate::str::contains("Letter for instruction").not());
}
