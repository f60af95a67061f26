use std::sync::Arc;

use room_orchestrator::RoomManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RoomManager>,
}

impl AppState {
    pub fn new(manager: RoomManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
