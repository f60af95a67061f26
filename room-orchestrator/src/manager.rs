use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use room_ports::{allocate, PortRange};
use room_runtime::{ContainerRuntime, UnitDetails, UnitStats};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compose::render_compose;
use crate::config::RoomConfig;
use crate::error::{OrchestratorError, Result};
use crate::registry::{OwnershipLabels, OwnershipRegistry};
use crate::settings::RoomSettings;
use crate::translator::{settings_from_unit, to_unit_spec, RESERVED_ENV};
use crate::types::{RoomData, RoomStats};

/// Lifecycle actions addressable by name, e.g. from a URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    Start,
    Stop,
    Restart,
    Remove,
}

impl fmt::Display for RoomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomAction::Start => write!(f, "start"),
            RoomAction::Stop => write!(f, "stop"),
            RoomAction::Restart => write!(f, "restart"),
            RoomAction::Remove => write!(f, "remove"),
        }
    }
}

impl FromStr for RoomAction {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(RoomAction::Start),
            "stop" => Ok(RoomAction::Stop),
            "restart" => Ok(RoomAction::Restart),
            "remove" => Ok(RoomAction::Remove),
            other => Err(OrchestratorError::InvalidSettings(format!(
                "unknown room action {other:?}"
            ))),
        }
    }
}

fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("room-{}", &id[..8])
}

/// Logs a failed operation with its name and room, then passes the result on.
fn logged<T>(op: &'static str, room: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_client_error() {
            warn!(op, room, error = %e, "Room operation rejected");
        } else {
            error!(op, room, error = %e, "Room operation failed");
        }
    }
    result
}

/// Drives room lifecycles against an injected container runtime.
///
/// The runtime is the only store: every call re-reads what it needs, so the
/// manager holds no per-room state and can be shared freely behind an `Arc`.
/// Allocation is serialized so two calls never scan the same claims.
#[derive(Clone)]
pub struct RoomManager {
    config: RoomConfig,
    runtime: Arc<dyn ContainerRuntime>,
    registry: OwnershipRegistry,
    allocation: Arc<Mutex<()>>,
}

impl RoomManager {
    pub fn new(config: RoomConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let registry = OwnershipRegistry::new(runtime.clone());
        Self {
            config,
            runtime,
            registry,
            allocation: Arc::new(Mutex::new(())),
        }
    }

    fn allocation_guard(&self) -> MutexGuard<'_, ()> {
        self.allocation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn runtime_name(&self) -> &'static str {
        self.runtime.name()
    }

    /// Rooms carrying every label in `filter`.
    pub fn list(&self, filter: &BTreeMap<String, String>) -> Result<Vec<RoomData>> {
        let units = logged("list", "*", self.registry.list(filter))?;
        Ok(units.iter().map(RoomData::from).collect())
    }

    /// Creates a room without starting it and returns its id.
    pub fn create(&self, settings: RoomSettings) -> Result<String> {
        let room = settings.name.clone();
        logged("create", &room, self.create_room(settings))
    }

    fn create_room(&self, mut settings: RoomSettings) -> Result<String> {
        settings.validate(RESERVED_ENV)?;
        if settings.name.is_empty() {
            settings.name = generate_name();
        }

        let _guard = self.allocation_guard();
        self.ensure_name_free(&settings.name, None)?;

        let claimed = self.registry.claimed_ranges()?;
        let ports = allocate(self.config.ephemeral_pool, settings.max_connections, &claimed)?;
        let spec = to_unit_spec(&settings, ports, &self.config)?;

        let id = self.runtime.create(&spec)?;
        self.verify_claim(&id, ports)
            .map_err(|e| self.discard(&id, e))?;
        info!(room = %settings.name, id = %id, ports = %ports, "Room created");
        Ok(id)
    }

    /// Creates a room and starts it. A room whose ports turn out to be bound
    /// already is removed again, so retrying the call rescans the pool.
    pub fn create_and_start(&self, settings: RoomSettings) -> Result<String> {
        let room = settings.name.clone();
        let result = self.create_room(settings).and_then(|id| {
            match self.runtime.start(&id).map_err(OrchestratorError::from) {
                Ok(()) => {
                    info!(id = %id, "Room started");
                    Ok(id)
                }
                Err(e @ OrchestratorError::PortConflict(_)) => Err(self.discard(&id, e)),
                Err(e) => Err(e),
            }
        });
        logged("create_and_start", &room, result)
    }

    /// Fails with `PortConflict` when another owned unit labels a range
    /// overlapping `ports`. Units created elsewhere between our scan and our
    /// create are only visible here.
    fn verify_claim(&self, id: &str, ports: PortRange) -> Result<()> {
        let contested = self
            .registry
            .list(&BTreeMap::new())?
            .iter()
            .filter(|u| u.id != id)
            .filter_map(|u| OwnershipLabels::from_labels(&u.labels).port_range)
            .find(|other| other.overlaps_with(&ports));
        match contested {
            Some(other) => Err(OrchestratorError::PortConflict(format!(
                "ports {ports} overlap {other} claimed by another room"
            ))),
            None => Ok(()),
        }
    }

    /// Removes a unit created by this call and hands `err` back.
    fn discard(&self, id: &str, err: OrchestratorError) -> OrchestratorError {
        match self.runtime.remove(id, true) {
            Ok(()) => debug!(id, "Abandoned room removed"),
            Err(cleanup) => warn!(id, error = %cleanup, "Failed to remove abandoned room"),
        }
        err
    }

    /// `current` is the id of a unit allowed to hold the name already.
    fn ensure_name_free(&self, name: &str, current: Option<&str>) -> Result<()> {
        match self.registry.find_by_name(name)? {
            Some(unit) if Some(unit.id.as_str()) != current => Err(
                OrchestratorError::InvalidSettings(format!("room name {name:?} is already in use")),
            ),
            _ => Ok(()),
        }
    }

    pub fn start(&self, id: &str) -> Result<()> {
        logged("start", id, self.start_room(id))
    }

    fn start_room(&self, id: &str) -> Result<()> {
        let unit = self.registry.inspect(id)?;
        self.runtime.start(unit.id())?;
        info!(id, "Room started");
        Ok(())
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        logged("stop", id, self.stop_room(id))
    }

    fn stop_room(&self, id: &str) -> Result<()> {
        let unit = self.registry.inspect(id)?;
        self.runtime.stop(unit.id())?;
        info!(id, "Room stopped");
        Ok(())
    }

    pub fn restart(&self, id: &str) -> Result<()> {
        logged("restart", id, self.stop_room(id).and_then(|_| self.start_room(id)))
    }

    /// Stops the room if it is running, then deletes it with its volumes.
    pub fn remove(&self, id: &str) -> Result<()> {
        logged(
            "remove",
            id,
            self.registry.inspect(id).and_then(|unit| self.remove_unit(&unit)),
        )
    }

    fn remove_unit(&self, unit: &UnitDetails) -> Result<()> {
        if unit.running() {
            self.runtime.stop(unit.id())?;
        }
        self.runtime.remove(unit.id(), true)?;
        info!(id = unit.id(), "Room removed");
        Ok(())
    }

    pub fn perform(&self, id: &str, action: RoomAction) -> Result<()> {
        match action {
            RoomAction::Start => self.start(id),
            RoomAction::Stop => self.stop(id),
            RoomAction::Restart => self.restart(id),
            RoomAction::Remove => self.remove(id),
        }
    }

    /// Replaces a room with one built from its stored settings merged with
    /// `overlay`. Returns the new id; the room runs again if it was running.
    ///
    /// Everything that can be checked is checked before the old unit is
    /// removed. A failure to create afterwards leaves no room behind and is
    /// reported as `RecreateFailed`.
    pub fn recreate(&self, id: &str, overlay: Option<&Value>) -> Result<String> {
        logged("recreate", id, self.recreate_room(id, overlay))
    }

    fn recreate_room(&self, id: &str, overlay: Option<&Value>) -> Result<String> {
        let unit = self.registry.inspect(id)?;
        let stored = settings_from_unit(&unit, &self.config);

        let mut settings = match overlay {
            Some(overlay) => stored.merged_with(overlay)?,
            None => stored.clone(),
        };
        if settings.name.is_empty() {
            settings.name = stored.name;
        }
        settings.validate(RESERVED_ENV)?;
        self.ensure_name_free(&settings.name, Some(unit.id()))?;

        // the old unit's range is released by the removal below
        let _guard = self.allocation_guard();
        let claimed: Vec<_> = self
            .registry
            .list(&BTreeMap::new())?
            .iter()
            .filter(|u| u.id != unit.id())
            .filter_map(|u| OwnershipLabels::from_labels(&u.labels).port_range)
            .collect();
        let ports = allocate(self.config.ephemeral_pool, settings.max_connections, &claimed)?;
        let spec = to_unit_spec(&settings, ports, &self.config)?;

        self.remove_unit(&unit)?;

        let new_id = self
            .runtime
            .create(&spec)
            .map_err(OrchestratorError::from)
            .and_then(|new_id| {
                self.verify_claim(&new_id, ports)
                    .map_err(|e| self.discard(&new_id, e))?;
                Ok(new_id)
            })
            .map_err(|e| OrchestratorError::RecreateFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        if unit.running() {
            self.runtime.start(&new_id)?;
        }
        info!(old_id = id, new_id = %new_id, room = %settings.name, "Room recreated");
        Ok(new_id)
    }

    pub fn get_entry(&self, id: &str) -> Result<RoomData> {
        let unit = logged("get_entry", id, self.registry.inspect(id))?;
        Ok(RoomData::from(&unit.summary))
    }

    pub fn get_entry_by_name(&self, name: &str) -> Result<RoomData> {
        let found = self
            .registry
            .find_by_name(name)
            .and_then(|unit| unit.ok_or_else(|| OrchestratorError::NotFound(name.to_string())));
        let unit = logged("get_entry_by_name", name, found)?;
        Ok(RoomData::from(&unit))
    }

    /// Settings the room was created with, including passwords and envs.
    pub fn get_settings(&self, id: &str) -> Result<RoomSettings> {
        let unit = logged("get_settings", id, self.registry.inspect(id))?;
        Ok(settings_from_unit(&unit, &self.config))
    }

    pub fn get_stats(&self, id: &str) -> Result<RoomStats> {
        logged("get_stats", id, self.room_stats(id))
    }

    fn room_stats(&self, id: &str) -> Result<RoomStats> {
        let unit = self.registry.inspect(id)?;
        let stats = if unit.running() {
            self.runtime.stats(unit.id())?
        } else {
            UnitStats::default()
        };
        Ok(RoomStats::new(unit.running(), unit.started_at, stats))
    }

    /// A docker-compose document reproducing every owned room.
    pub fn export_as_docker_compose(&self) -> Result<String> {
        logged("export_as_docker_compose", "*", self.compose_document())
    }

    fn compose_document(&self) -> Result<String> {
        let mut specs = Vec::new();
        for summary in self.registry.list(&BTreeMap::new())? {
            let Some(ports) = OwnershipLabels::from_labels(&summary.labels).port_range else {
                warn!(id = %summary.id, "Room has no port range, leaving it out of the export");
                continue;
            };
            let unit = self.registry.inspect(&summary.id)?;
            let settings = settings_from_unit(&unit, &self.config);
            specs.push(to_unit_spec(&settings, ports, &self.config)?);
        }
        debug!(rooms = specs.len(), "Rendering compose export");
        render_compose(&specs, &self.config.routing.network)
    }
}
