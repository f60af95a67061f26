//! User-supplied room settings and their validation.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_MAX_CONNECTIONS: u16 = 10;
pub const MAX_CONNECTIONS_LIMIT: u16 = 1000;
pub const DEFAULT_SHM_SIZE: i64 = 2_000_000_000;

static LABEL_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.-]+$").expect("valid regex"));
static ROOM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,62}$").expect("valid regex"));
static ENV_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("valid regex"));
static SCREEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2,5}x[0-9]{2,5}(@[0-9]{1,3})?$").expect("valid regex"));

/// Label keys may only contain `[a-z0-9.-]`.
pub fn check_label_key(key: &str) -> bool {
    LABEL_KEY_RE.is_match(key)
}

pub fn check_room_name(name: &str) -> bool {
    ROOM_NAME_RE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomResources {
    pub cpu_shares: i64,
    pub nano_cpus: i64,
    pub memory: i64,
    pub shm_size: i64,
}

impl Default for RoomResources {
    fn default() -> Self {
        Self {
            cpu_shares: 0,
            nano_cpus: 0,
            memory: 0,
            shm_size: DEFAULT_SHM_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Room name, also its URL path segment. Generated when empty.
    pub name: String,
    /// Image reference. Empty means the configured default image.
    pub image: String,
    /// Concurrent connections; one host UDP port is reserved per connection.
    pub max_connections: u16,
    pub user_pass: String,
    pub admin_pass: String,
    pub control_protection: bool,
    pub implicit_control: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub envs: BTreeMap<String, String>,
    pub resources: RoomResources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            user_pass: String::new(),
            admin_pass: String::new(),
            control_protection: false,
            implicit_control: false,
            screen: None,
            envs: BTreeMap::new(),
            resources: RoomResources::default(),
            network_mode: None,
            labels: BTreeMap::new(),
        }
    }
}

impl RoomSettings {
    /// Rejects anything the translator cannot turn into a unit.
    ///
    /// `reserved_env` lists variables the engine manages itself.
    pub fn validate(&self, reserved_env: &[&str]) -> Result<()> {
        let invalid = |msg: String| Err(OrchestratorError::InvalidSettings(msg));

        if !self.name.is_empty() && !check_room_name(&self.name) {
            return invalid(format!(
                "room name {:?} must match [a-z0-9][a-z0-9-]{{0,62}}",
                self.name
            ));
        }

        if self.image.chars().any(char::is_whitespace) {
            return invalid(format!("image {:?} contains whitespace", self.image));
        }

        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS_LIMIT {
            return invalid(format!(
                "maxConnections must be between 1 and {MAX_CONNECTIONS_LIMIT}, got {}",
                self.max_connections
            ));
        }

        if let Some(screen) = &self.screen {
            if !SCREEN_RE.is_match(screen) {
                return invalid(format!(
                    "screen {screen:?} must look like 1280x720 or 1280x720@30"
                ));
            }
        }

        for key in self.envs.keys() {
            if !ENV_KEY_RE.is_match(key) {
                return invalid(format!("environment variable name {key:?} is invalid"));
            }
            if reserved_env.contains(&key.as_str()) {
                return invalid(format!(
                    "environment variable {key} is managed by the orchestrator"
                ));
            }
        }

        let r = &self.resources;
        if r.cpu_shares < 0 || r.nano_cpus < 0 || r.memory < 0 || r.shm_size < 0 {
            return invalid("resource limits must not be negative".to_string());
        }

        if let Some(mode) = &self.network_mode {
            if mode.trim().is_empty() {
                return invalid("networkMode must not be empty".to_string());
            }
        }

        if let Some(key) = self.labels.keys().find(|k| !check_label_key(k)) {
            return Err(OrchestratorError::InvalidLabel(key.clone()));
        }

        Ok(())
    }

    /// Applies a partial JSON document on top of these settings.
    ///
    /// Fields absent from `overlay` keep their current values; nested objects
    /// (resources, envs, labels) are merged key by key.
    pub fn merged_with(&self, overlay: &Value) -> Result<RoomSettings> {
        if overlay.is_null() {
            return Ok(self.clone());
        }
        if !overlay.is_object() {
            return Err(OrchestratorError::InvalidSettings(
                "settings override must be a JSON object".to_string(),
            ));
        }

        let mut base = serde_json::to_value(self)
            .map_err(|e| OrchestratorError::InvalidSettings(e.to_string()))?;
        merge_json(&mut base, overlay);

        serde_json::from_value(base).map_err(|e| OrchestratorError::InvalidSettings(e.to_string()))
    }
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let nested = value.is_object() && base.get(key).is_some_and(Value::is_object);
                if let Some(existing) = base.get_mut(key).filter(|_| nested) {
                    merge_json(existing, value);
                } else {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
