use std::sync::Arc;

use room_runtime::mock::MockRuntime;

use crate::config::RoomConfig;
use crate::manager::RoomManager;

/// A manager over an empty in-memory runtime, with default configuration.
pub fn mock_manager() -> (RoomManager, Arc<MockRuntime>) {
    mock_manager_with(RoomConfig::default())
}

/// Returns the runtime handle too, so tests can inspect calls and seed units.
pub fn mock_manager_with(config: RoomConfig) -> (RoomManager, Arc<MockRuntime>) {
    let runtime = Arc::new(MockRuntime::new());
    (RoomManager::new(config, runtime.clone()), runtime)
}
