//! Stats backend: anonymous milestone counting over HTTP.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use sliver_core::{EventKind, now_iso8601};
use sliver_store::Store;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackRequest {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    book_title: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
}

type ApiResponse = (StatusCode, Json<Value>);

fn error(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(json!({ "error": message })))
}

pub fn router(store: Store) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };
    Router::new()
        .route("/api/track", post(track))
        .route("/api/stats", get(stats))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track(
    State(state): State<AppState>,
    body: Result<Json<TrackRequest>, JsonRejection>,
) -> ApiResponse {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            tracing::debug!("rejected track body: {e}");
            return error(StatusCode::BAD_REQUEST, &e.body_text());
        }
    };

    let field = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(device_id), Some(book_title), Some(event_type)) = (
        field(req.device_id),
        field(req.book_title),
        field(req.event_type),
    ) else {
        return error(
            StatusCode::BAD_REQUEST,
            "Missing required fields: device_id, book_title, event_type",
        );
    };

    let kind = match event_type.parse::<EventKind>() {
        Ok(kind) => kind,
        Err(msg) => return error(StatusCode::BAD_REQUEST, &msg),
    };

    let store = state.store.lock().await;
    match store.record_event(&device_id, &book_title, kind) {
        Ok(stat_id) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "stat_id": stat_id })),
        ),
        Err(e) => {
            tracing::error!("track error: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn stats(State(state): State<AppState>) -> ApiResponse {
    let store = state.store.lock().await;
    match store.stat_counts() {
        Ok(counts) => (StatusCode::OK, Json(json!(counts))),
        Err(e) => {
            tracing::error!("stats error: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": now_iso8601() }))
}

/// Serve until `shutdown` is cancelled.
pub async fn run(listener: TcpListener, store: Store, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("stats server listening on {addr}");

    let app = router(store);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("stats server stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sliver_store::StatCounts;
    use std::net::SocketAddr;

    /// Start a server on an ephemeral port over an in-memory store.
    pub(crate) async fn spawn_test_server() -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        let store = Store::open_in_memory().unwrap();
        tokio::spawn(run(listener, store, token.clone()));
        (addr, token)
    }

    async fn post_track(addr: SocketAddr, body: Value) -> (StatusCode, Value) {
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/track"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    async fn get_stats(addr: SocketAddr) -> StatCounts {
        reqwest::get(format!("http://{addr}/api/stats"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, token) = spawn_test_server().await;
        let body: Value = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        token.cancel();
    }

    #[tokio::test]
    async fn test_track_then_stats() {
        let (addr, token) = spawn_test_server().await;

        let (status, body) = post_track(
            addr,
            json!({"device_id": "dev-1", "book_title": "Dune", "event_type": "upload_started"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["stat_id"].as_i64().unwrap() > 0);

        post_track(
            addr,
            json!({"device_id": "dev-1", "book_title": "Dune", "event_type": "daily_goal_reached"}),
        )
        .await;

        let counts = get_stats(addr).await;
        assert_eq!(counts.total_unique_users, 1);
        assert_eq!(counts.total_uploads, 1);
        assert_eq!(counts.total_daily_goals_met, 1);
        assert_eq!(counts.total_habits_mastered, 0);
        token.cancel();
    }

    #[tokio::test]
    async fn test_missing_fields_is_400() {
        let (addr, token) = spawn_test_server().await;
        let (status, body) = post_track(addr, json!({"device_id": "dev-1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Missing required fields"));
        assert_eq!(get_stats(addr).await, StatCounts::default());
        token.cancel();
    }

    #[tokio::test]
    async fn test_unknown_event_is_400() {
        let (addr, token) = spawn_test_server().await;
        let (status, body) = post_track(
            addr,
            json!({"device_id": "d", "book_title": "t", "event_type": "finished"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid event_type"));
        token.cancel();
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let (addr, token) = spawn_test_server().await;
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/track"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        token.cancel();
    }
}
