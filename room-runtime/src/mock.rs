//! In-memory container runtime for tests.
//!
//! Behaves like a single Docker host: names are unique, starting a unit whose
//! host ports are held by another running unit fails with `PortConflict`, and
//! every trait call is recorded so tests can assert what reached the runtime.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::{Result, RuntimeError};
use crate::types::{ResourceLimits, UnitDetails, UnitSpec, UnitStats, UnitSummary};
use crate::ContainerRuntime;

#[derive(Debug)]
struct MockUnit {
    details: UnitDetails,
    spec: Option<UnitSpec>,
}

#[derive(Debug, Default)]
struct MockState {
    units: BTreeMap<String, MockUnit>,
    next_id: u64,
    calls: Vec<String>,
    failures: HashMap<String, RuntimeError>,
}

impl MockState {
    fn resolve(&self, id: &str) -> Option<String> {
        if self.units.contains_key(id) {
            return Some(id.to_string());
        }
        self.units
            .iter()
            .find(|(_, unit)| unit.details.summary.name == id)
            .map(|(key, _)| key.clone())
    }

    fn record(&mut self, op: &str) -> Result<()> {
        self.calls.push(op.to_string());
        match self.failures.remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}", 0xc0ffee_000000_u64 + self.next_id)
    }
}

#[derive(Debug, Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names of every trait method called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes the next call to `op` ("create", "start", ...) fail with `err`.
    pub fn fail_next(&self, op: &str, err: RuntimeError) {
        self.lock().failures.insert(op.to_string(), err);
    }

    /// Adds a running unit not created through the trait, e.g. a co-tenant workload.
    pub fn insert_foreign(&self, name: &str, labels: BTreeMap<String, String>) -> String {
        let mut state = self.lock();
        let id = state.allocate_id();
        let details = UnitDetails {
            summary: UnitSummary {
                id: id.clone(),
                name: name.to_string(),
                image: "nginx:latest".to_string(),
                labels,
                running: true,
                status: "running".to_string(),
                created: Some(Utc::now()),
            },
            env: Vec::new(),
            resources: ResourceLimits::default(),
            network: "bridge".to_string(),
            cap_add: Vec::new(),
            started_at: Some(Utc::now()),
        };
        state.units.insert(id.clone(), MockUnit { details, spec: None });
        id
    }

    /// Direct look at a unit, without recording a call.
    pub fn unit(&self, id: &str) -> Option<UnitDetails> {
        let state = self.lock();
        let key = state.resolve(id)?;
        state.units.get(&key).map(|u| u.details.clone())
    }

    /// The `UnitSpec` a unit was created from, without recording a call.
    pub fn spec(&self, id: &str) -> Option<UnitSpec> {
        let state = self.lock();
        let key = state.resolve(id)?;
        state.units.get(&key).and_then(|u| u.spec.clone())
    }

    pub fn unit_count(&self) -> usize {
        self.lock().units.len()
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn list(&self, labels: &BTreeMap<String, String>) -> Result<Vec<UnitSummary>> {
        let mut state = self.lock();
        state.record("list")?;

        Ok(state
            .units
            .values()
            .filter(|unit| {
                labels
                    .iter()
                    .all(|(k, v)| unit.details.summary.labels.get(k) == Some(v))
            })
            .map(|unit| unit.details.summary.clone())
            .collect())
    }

    fn inspect(&self, id: &str) -> Result<UnitDetails> {
        let mut state = self.lock();
        state.record("inspect")?;

        let key = state
            .resolve(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        Ok(state.units[&key].details.clone())
    }

    fn create(&self, spec: &UnitSpec) -> Result<String> {
        let mut state = self.lock();
        state.record("create")?;

        if state.resolve(&spec.name).is_some() {
            return Err(RuntimeError::CommandFailed(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }

        let id = state.allocate_id();
        let details = UnitDetails {
            summary: UnitSummary {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                labels: spec.labels.clone(),
                running: false,
                status: "created".to_string(),
                created: Some(Utc::now()),
            },
            env: spec.env.clone(),
            resources: spec.resources,
            network: spec.network.clone(),
            cap_add: spec.cap_add.clone(),
            started_at: None,
        };
        state.units.insert(
            id.clone(),
            MockUnit {
                details,
                spec: Some(spec.clone()),
            },
        );
        Ok(id)
    }

    fn start(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("start")?;

        let key = state
            .resolve(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if state.units[&key].details.summary.running {
            return Ok(());
        }

        let wanted: Vec<_> = state.units[&key]
            .spec
            .as_ref()
            .map(|s| s.host_ports().collect())
            .unwrap_or_default();
        let taken = state
            .units
            .iter()
            .filter(|(other, unit)| **other != key && unit.details.summary.running)
            .filter_map(|(_, unit)| unit.spec.as_ref())
            .flat_map(|spec| spec.host_ports())
            .find(|bound| wanted.contains(bound));
        if let Some((port, protocol)) = taken {
            return Err(RuntimeError::PortConflict(format!(
                "Bind for 0.0.0.0:{port}/{protocol} failed: port is already allocated"
            )));
        }

        let unit = state
            .units
            .get_mut(&key)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        unit.details.summary.running = true;
        unit.details.summary.status = "running".to_string();
        unit.details.started_at = Some(Utc::now());
        Ok(())
    }

    fn stop(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("stop")?;

        let key = state
            .resolve(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if let Some(unit) = state.units.get_mut(&key) {
            if unit.details.summary.running {
                unit.details.summary.running = false;
                unit.details.summary.status = "exited".to_string();
            }
        }
        Ok(())
    }

    fn remove(&self, id: &str, _remove_volumes: bool) -> Result<()> {
        let mut state = self.lock();
        state.record("remove")?;

        let key = state
            .resolve(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        state.units.remove(&key);
        Ok(())
    }

    fn stats(&self, id: &str) -> Result<UnitStats> {
        let mut state = self.lock();
        state.record("stats")?;

        let key = state
            .resolve(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if !state.units[&key].details.summary.running {
            return Ok(UnitStats::default());
        }
        Ok(UnitStats {
            cpu_percent: 1.5,
            memory_usage: 256 * 1024 * 1024,
            memory_limit: 2 * 1024 * 1024 * 1024,
            pids: 17,
        })
    }
}
