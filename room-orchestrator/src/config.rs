use room_ports::PortRange;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::routing::RoutingConfig;

pub const DEFAULT_EPHEMERAL_POOL: &str = "59000-59999";
pub const DEFAULT_IMAGE: &str = "m1k1o/neko:firefox";
pub const DEFAULT_INSTANCE_NAME: &str = "rooms";

/// Engine-wide settings, read once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// External addresses announced to clients for 1:1 NAT.
    pub nat1to1_ips: Vec<String>,
    /// Host ports rooms may be given.
    pub ephemeral_pool: PortRange,
    /// Image used when room settings do not name one.
    pub default_image: String,
    /// Prefix of every room's container name.
    pub instance_name: String,
    pub routing: RoutingConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            nat1to1_ips: Vec::new(),
            ephemeral_pool: parse_ephemeral_pool(DEFAULT_EPHEMERAL_POOL),
            default_image: DEFAULT_IMAGE.to_string(),
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            routing: RoutingConfig::default(),
        }
    }
}

impl RoomConfig {
    pub fn container_name(&self, room_name: &str) -> String {
        format!("{}-{}", self.instance_name, room_name)
    }
}

/// Parses a `MIN-MAX` pool definition. Reversed bounds are swapped; a
/// malformed bound falls back to the default for that bound.
pub fn parse_ephemeral_pool(raw: &str) -> PortRange {
    const FALLBACK_MIN: u16 = 59000;
    const FALLBACK_MAX: u16 = 59999;

    let (min, max) = match raw.trim().split_once('-') {
        Some((min, max)) => (
            min.trim().parse().unwrap_or_else(|_| {
                warn!(value = min, "Invalid ephemeral pool start, using default");
                FALLBACK_MIN
            }),
            max.trim().parse().unwrap_or_else(|_| {
                warn!(value = max, "Invalid ephemeral pool end, using default");
                FALLBACK_MAX
            }),
        ),
        None => {
            warn!(value = raw, "Invalid ephemeral pool, using default");
            (FALLBACK_MIN, FALLBACK_MAX)
        }
    };

    PortRange {
        start: min.min(max),
        end: min.max(max),
    }
}
