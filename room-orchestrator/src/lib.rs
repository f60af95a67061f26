//! Room orchestration business logic
//!
//! This crate turns declarative room settings into container runtime units,
//! allocates their port ranges, scopes every read to units it owns and drives
//! their lifecycle. It is consumed by the room-api HTTP service but holds no
//! HTTP concerns itself.

pub mod compose;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod routing;
pub mod settings;
pub mod translator;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::RoomConfig;
pub use error::{OrchestratorError, Result};
pub use manager::{RoomAction, RoomManager};
pub use registry::OwnershipRegistry;
pub use routing::RoutingConfig;
pub use settings::{RoomResources, RoomSettings};
pub use types::{RoomData, RoomStats};
