use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use ferromon_common::AgentSnapshot;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use crate::state::{flatten_snapshot, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/metrics/collect", post(collect))
        .route("/api/metrics", get(latest_snapshots))
        .route("/api/metrics/query", get(query_metrics))
        .route("/api/health", get(health))
}

/// Ingests one agent snapshot: the registry keeps the latest per agent,
/// the store gets the flattened series.
async fn collect(
    State(state): State<AppState>,
    Json(snapshot): Json<AgentSnapshot>,
) -> impl IntoResponse {
    tracing::debug!(
        agent_id = %snapshot.agent_id,
        hostname = %snapshot.hostname,
        "Snapshot received"
    );
    state.store.insert(flatten_snapshot(&snapshot));
    state.lock_registry().upsert(snapshot);
    Json(json!({ "status": "ok" }))
}

/// Latest snapshot for every known agent.
async fn latest_snapshots(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.lock_registry().snapshots())
}

#[derive(Debug, Deserialize)]
struct MetricQuery {
    name: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

/// Time-range query over the flattened store. `name` is required; the
/// range defaults to the last hour.
async fn query_metrics(
    State(state): State<AppState>,
    Query(params): Query<MetricQuery>,
) -> Response {
    let Some(name) = params.name.filter(|n| !n.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "query parameter 'name' is required" })),
        )
            .into_response();
    };

    let end = params.end.unwrap_or_else(Utc::now);
    let start = params.start.unwrap_or(end - Duration::hours(1));
    let metrics = state.store.query_range(&name, &HashMap::new(), start, end);

    Json(metrics).into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_secs = (Utc::now() - state.start_time).num_seconds();
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "agents": state.lock_registry().len(),
    }))
}
