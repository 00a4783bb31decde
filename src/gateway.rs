//! # Gateway Surface - REST and Streaming Operations
//!
//! The HTTP gateway itself (auth, TLS, principals) is an external
//! collaborator; this module exposes the operations it consumes, mapped
//! one-to-one onto [`Platform`] methods, plus the server-sent event stream of
//! metrics samples and redacted log items.

use crate::Platform;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// Build the gateway router over a shared platform
pub fn router(platform: Arc<Platform>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/doctor", get(health))
        .route("/swarm", get(swarm))
        .route("/memory/search", get(memory_search))
        .route("/memory/stats", get(memory_stats))
        .route("/policy/pending", get(policy_pending))
        .route("/policy/approve/:id", post(policy_approve))
        .route("/policy/reject/:id", post(policy_reject))
        .route("/stream", get(stream))
        .with_state(platform)
}

async fn status(State(platform): State<Arc<Platform>>) -> Json<Value> {
    Json(json!(platform.status().await))
}

async fn health(State(platform): State<Arc<Platform>>) -> Json<Value> {
    Json(json!(platform.health_report().await))
}

async fn swarm(State(platform): State<Arc<Platform>>) -> Json<Value> {
    match platform.swarm_stats().await {
        Some(stats) => Json(json!(stats)),
        None => Json(json!({ "active": false })),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn memory_search(
    State(platform): State<Arc<Platform>>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let hits = platform.memory().search(&params.q, 20).await;
    Json(json!(hits))
}

async fn memory_stats(State(platform): State<Arc<Platform>>) -> Json<Value> {
    Json(json!(platform.memory().stats().await))
}

async fn policy_pending(State(platform): State<Arc<Platform>>) -> Json<Value> {
    Json(json!(platform.pending_approvals().await))
}

async fn policy_approve(
    State(platform): State<Arc<Platform>>,
    Path(id): Path<Uuid>,
) -> Json<Value> {
    Json(json!({ "id": id, "approved": platform.approve(id).await }))
}

async fn policy_reject(
    State(platform): State<Arc<Platform>>,
    Path(id): Path<Uuid>,
) -> Json<Value> {
    Json(json!({ "id": id, "rejected": platform.reject(id).await }))
}

/// SSE stream: a metrics sample every ~2 s plus every log event dispatched
/// after subscription
async fn stream(
    State(platform): State<Arc<Platform>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut logs = platform.subscribe_logs();

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let payload = json!({
                        "type": "metrics",
                        "data": { "timestamp": Utc::now(), "heapUsed": heap_used_bytes() },
                    });
                    yield Ok(Event::default().data(payload.to_string()));
                }
                item = logs.recv() => {
                    match item {
                        Ok(log) => {
                            let payload = json!({ "type": "log", "data": log });
                            yield Ok(Event::default().data(payload.to_string()));
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Resident set size of this process, in bytes
fn heap_used_bytes() -> u64 {
    procfs::process::Process::myself()
        .and_then(|process| process.statm())
        .map(|statm| statm.resident * procfs::page_size())
        .unwrap_or(0)
}
