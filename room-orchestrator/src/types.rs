use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use room_ports::PortRange;
use room_runtime::{UnitStats, UnitSummary};
use serde::{Deserialize, Serialize};

use crate::registry::OwnershipLabels;

/// Read-only view of one room, rebuilt from the runtime on every read.
///
/// Passwords and environment are left out; `GetSettings` returns those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomData {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image: String,
    pub max_connections: u16,
    pub running: bool,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
    pub port_range: Option<PortRange>,
    pub labels: BTreeMap<String, String>,
}

impl From<&UnitSummary> for RoomData {
    fn from(unit: &UnitSummary) -> Self {
        let owned = OwnershipLabels::from_labels(&unit.labels);
        RoomData {
            id: unit.id.clone(),
            name: owned.name,
            url: owned.url,
            image: unit.image.clone(),
            max_connections: owned
                .port_range
                .map(|r| u16::try_from(r.size()).unwrap_or(u16::MAX))
                .unwrap_or(0),
            running: unit.running,
            status: unit.status.clone(),
            created: unit.created,
            port_range: owned.port_range,
            labels: owned.user_labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub pids: u64,
}

impl RoomStats {
    pub fn new(running: bool, started_at: Option<DateTime<Utc>>, stats: UnitStats) -> Self {
        Self {
            running,
            started_at: started_at.filter(|_| running),
            cpu_percent: stats.cpu_percent,
            memory_usage: stats.memory_usage,
            memory_limit: stats.memory_limit,
            pids: stats.pids,
        }
    }
}
