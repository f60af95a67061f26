//! Container runtime abstraction library.
//!
//! Rooms live entirely inside the container runtime: there is no other store.
//! This crate defines the `ContainerRuntime` trait the orchestrator drives,
//! the data it exchanges, a Docker CLI implementation and (behind the
//! `test-helpers` feature) an in-memory runtime for tests.

use std::collections::BTreeMap;

pub mod error;
pub mod types;

#[cfg(feature = "docker")]
pub mod docker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use error::{Result, RuntimeError};
pub use types::{
    ExposedPort, Protocol, ResourceLimits, UnitDetails, UnitSpec, UnitStats, UnitSummary,
};

/// The operations the orchestrator needs from a container runtime.
///
/// Every call blocks until the runtime has finished or failed. Implementations
/// must be shareable across threads; the runtime itself serializes mutations
/// to a single unit.
pub trait ContainerRuntime: Send + Sync {
    /// Name of the runtime (e.g., "docker", "mock").
    fn name(&self) -> &'static str;

    /// List all units, running or not, carrying every `label=value` pair in `labels`.
    fn list(&self, labels: &BTreeMap<String, String>) -> Result<Vec<UnitSummary>>;

    /// Inspect one unit by id or name.
    fn inspect(&self, id: &str) -> Result<UnitDetails>;

    /// Create a unit without starting it. Returns the runtime id.
    fn create(&self, spec: &UnitSpec) -> Result<String>;

    /// Start a unit. Starting a running unit is not an error.
    fn start(&self, id: &str) -> Result<()>;

    /// Stop a unit. Stopping a stopped unit is not an error.
    fn stop(&self, id: &str) -> Result<()>;

    /// Delete a unit, optionally with its anonymous volumes.
    fn remove(&self, id: &str, remove_volumes: bool) -> Result<()>;

    /// Current resource usage of a running unit.
    fn stats(&self, id: &str) -> Result<UnitStats>;
}
