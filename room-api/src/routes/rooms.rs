use std::collections::BTreeMap;

use crate::{error::ApiResult, state::AppState};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use room_orchestrator::{RoomAction, RoomData, RoomManager, RoomSettings, RoomStats};
use serde_json::Value;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/docker-compose", get(docker_compose))
        .route("/rooms/{id}", get(get_room).delete(remove_room))
        .route("/rooms/{id}/by-name", get(get_room_by_name))
        .route("/rooms/{id}/settings", get(get_settings))
        .route("/rooms/{id}/stats", get(get_stats))
        .route("/rooms/{id}/recreate", post(recreate_room))
        .route("/rooms/{id}/{action}", post(room_action))
}

/// Runs a synchronous manager call off the async executor.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&RoomManager) -> room_orchestrator::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = state.manager.clone();
    Ok(tokio::task::spawn_blocking(move || f(&manager)).await??)
}

async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<RoomData>>> {
    // first value wins for repeated keys
    let mut filter = BTreeMap::new();
    for (key, value) in params {
        filter.entry(key.to_lowercase()).or_insert(value);
    }

    let rooms = blocking(&state, move |m| m.list(&filter)).await?;
    Ok(Json(rooms))
}

async fn create_room(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<RoomData>> {
    let settings: RoomSettings = serde_json::from_slice(&body)?;

    let room = blocking(&state, move |m| {
        let id = m.create_and_start(settings)?;
        m.get_entry(&id)
    })
    .await?;
    Ok(Json(room))
}

async fn docker_compose(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let yaml = blocking(&state, |m| m.export_as_docker_compose()).await?;
    Ok(([(header::CONTENT_TYPE, "text/yaml")], yaml))
}

async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoomData>> {
    let room = blocking(&state, move |m| m.get_entry(&id)).await?;
    Ok(Json(room))
}

async fn get_room_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<RoomData>> {
    let room = blocking(&state, move |m| m.get_entry_by_name(&name)).await?;
    Ok(Json(room))
}

async fn get_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoomSettings>> {
    let settings = blocking(&state, move |m| m.get_settings(&id)).await?;
    Ok(Json(settings))
}

async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoomStats>> {
    let stats = blocking(&state, move |m| m.get_stats(&id)).await?;
    Ok(Json(stats))
}

/// The body is optional; when present it is merged onto the stored settings.
async fn recreate_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<RoomData>> {
    let overlay: Option<Value> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(serde_json::from_slice(&body)?)
    };

    let room = blocking(&state, move |m| {
        let new_id = m.recreate(&id, overlay.as_ref())?;
        m.get_entry(&new_id)
    })
    .await?;
    Ok(Json(room))
}

async fn room_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let action: RoomAction = action.parse()?;

    blocking(&state, move |m| m.perform(&id, action)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |m| m.remove(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
