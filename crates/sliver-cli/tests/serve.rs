//! Integration tests for `sliver serve`.
//! Binds an ephemeral port and talks to it with reqwest.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

fn sliver_binary() -> std::path::PathBuf {
    assert_cmd::cargo::cargo_bin!("sliver").into()
}

struct Server {
    child: Child,
    base: String,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_serve(data_dir: &TempDir) -> Server {
    let mut child = Command::new(sliver_binary())
        .args(["serve", "--bind", "127.0.0.1:0"])
        .env("SLIVER_DATA_DIR", data_dir.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn sliver serve");

    let stdout = child.stdout.take().expect("stdout pipe");
    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    let addr = line
        .trim()
        .strip_prefix("listening on ")
        .unwrap_or_else(|| panic!("unexpected first line: {line:?}"))
        .to_string();
    Server {
        child,
        base: format!("http://{addr}"),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let server = spawn_serve(&dir);

    let resp = reqwest::get(format!("{}/api/health", server.base)).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn track_then_stats() {
    let dir = TempDir::new().unwrap();
    let server = spawn_serve(&dir);
    let client = reqwest::Client::new();
    let track = format!("{}/api/track", server.base);

    let resp = client
        .post(&track)
        .json(&json!({
            "device_id": "d1",
            "book_title": "Dune",
            "event_type": "daily_goal_reached"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let resp = client
        .post(&track)
        .json(&json!({ "device_id": "d1", "book_title": "Dune", "event_type": "bogus" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let stats: Value = client
        .get(format!("{}/api/stats", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_unique_users"], 1);
    assert_eq!(stats["total_daily_goals_met"], 1);
    assert_eq!(stats["total_uploads"], 0);
    assert!(dir.path().join("stats.db").exists());
}
