//! Plain data exchanged with the runtime adapter.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A port the unit exposes, optionally published on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExposedPort {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_port: Option<u16>,
}

impl ExposedPort {
    pub fn internal(container_port: u16, protocol: Protocol) -> Self {
        Self {
            container_port,
            protocol,
            host_port: None,
        }
    }

    pub fn published(port: u16, protocol: Protocol) -> Self {
        Self {
            container_port: port,
            protocol,
            host_port: Some(port),
        }
    }
}

/// Resource limits applied to a unit. Zero means "runtime default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_shares: i64,
    pub nano_cpus: i64,
    pub memory: i64,
    pub shm_size: i64,
}

/// Everything the runtime needs to create one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub ports: Vec<ExposedPort>,
    pub cap_add: Vec<String>,
    pub resources: ResourceLimits,
    pub network: String,
    pub restart_policy: String,
}

impl UnitSpec {
    /// Host ports this unit binds when started.
    pub fn host_ports(&self) -> impl Iterator<Item = (u16, Protocol)> + '_ {
        self.ports
            .iter()
            .filter_map(|p| p.host_port.map(|host| (host, p.protocol)))
    }
}

/// Listing view of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub running: bool,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
}

/// Full inspection of a unit, enough to rebuild the `UnitSpec` that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDetails {
    pub summary: UnitSummary,
    pub env: Vec<String>,
    pub resources: ResourceLimits,
    pub network: String,
    pub cap_add: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl UnitDetails {
    pub fn id(&self) -> &str {
        &self.summary.id
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.summary.labels
    }

    pub fn running(&self) -> bool {
        self.summary.running
    }

    /// Looks up `KEY` in the `KEY=VALUE` environment list.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Point-in-time resource usage of a running unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub pids: u64,
}
