pub mod health;
pub mod rooms;

use crate::state::AppState;
use axum::Router;
use room_orchestrator::RoomManager;
use tower_http::trace::TraceLayer;

pub fn create_app(manager: RoomManager) -> Router {
    let state = AppState::new(manager);

    Router::new()
        .merge(health::routes())
        .merge(rooms::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
