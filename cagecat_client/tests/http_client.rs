//! `StatusClient` against an in-process server exposing the service's
//! JSON endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use cagecat_client::error::PollError;
use cagecat_client::poller::{StatusClient, StatusPoller, StatusSource};
use cagecat_client::sink::MemorySink;
use cagecat_client::{ServerStatusSnapshot, StageProgress};

async fn status() -> Json<Value> {
    Json(json!({
        "server_status": "running",
        "queued": 4,
        "running": 2,
        "completed": 1234
    }))
}

async fn stage(Path(job_id): Path<String>) -> (StatusCode, Json<Value>) {
    match job_id.as_str() {
        "A123B456C789D12" => (StatusCode::OK, Json(json!({ "finished": 3, "total": 7 }))),
        "B000B000B000B00" => (StatusCode::OK, Json(json!({ "finished": "many" }))),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Job not found" })),
        ),
    }
}

/// Serves the routes on an ephemeral port and returns the base URL.
async fn serve(prefix: &str) -> String {
    let routes = Router::new()
        .route("/status", get(status))
        .route("/results/stage/{job_id}", get(stage));
    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(prefix, routes)
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}{prefix}")
}

fn client(base: &str) -> StatusClient {
    StatusClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetches_server_status() {
    let base = serve("").await;
    let status = client(&base).server_status().await.unwrap();

    assert_eq!(
        status,
        ServerStatusSnapshot {
            server_status: "running".to_string(),
            running: 2,
            queued: 4,
            completed: 1234,
        }
    );
}

#[tokio::test]
async fn fetches_stage_progress() {
    let base = serve("").await;
    let progress = client(&base).stage_progress("A123B456C789D12").await.unwrap();

    assert_eq!(progress, StageProgress::new(3, 7));
    assert!(!progress.is_complete());
}

#[tokio::test]
async fn base_url_with_path_prefix() {
    let base = serve("/cagecat").await;
    let progress = client(&base).stage_progress("A123B456C789D12").await.unwrap();

    assert_eq!(progress.finished, 3);
}

#[tokio::test]
async fn error_status_is_reported() {
    let base = serve("").await;
    let err = client(&base).stage_progress("Z999Z999Z999Z99").await.unwrap_err();

    match err {
        PollError::Status { status, url } => {
            assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            assert!(url.ends_with("/results/stage/Z999Z999Z999Z99"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_payload_is_an_error() {
    let base = serve("").await;
    let err = client(&base).stage_progress("B000B000B000B00").await.unwrap_err();

    assert!(matches!(err, PollError::Http(_)));
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}")).server_status().await.unwrap_err();
    assert!(matches!(err, PollError::Http(_)));
}

#[tokio::test]
async fn refresh_status_updates_all_fields() {
    let base = serve("").await;
    let sink = Arc::new(MemorySink::new());
    let poller = StatusPoller::new(Arc::new(client(&base)), sink.clone());

    poller.refresh_status().await.unwrap();

    let shown = sink.snapshot().status.unwrap();
    assert_eq!(shown.server_status, "running");
    assert_eq!(shown.running, 2);
    assert_eq!(shown.queued, 4);
    assert_eq!(shown.completed, 1234);
}

#[tokio::test]
async fn failed_refresh_leaves_display_untouched() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = Arc::new(MemorySink::new());
    let poller = StatusPoller::new(Arc::new(client(&format!("http://{addr}"))), sink.clone());

    assert!(poller.refresh_status().await.is_err());
    assert!(sink.snapshot().status.is_none());
}
