use std::collections::BTreeMap;

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "room-api",
        "version": env!("CARGO_PKG_VERSION"),
        "runtime": state.manager.runtime_name()
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    // Check the container runtime answers
    let manager = state.manager.clone();
    let runtime_ok = tokio::task::spawn_blocking(move || manager.list(&BTreeMap::new()).is_ok())
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if runtime_ok { "ready" } else { "not_ready" },
        "service": "room-api",
        "version": env!("CARGO_PKG_VERSION"),
        "runtime": if runtime_ok { "connected" } else { "disconnected" }
    }))
}
