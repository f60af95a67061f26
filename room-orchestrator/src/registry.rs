//! Ownership tagging and discovery of room units.
//!
//! Every unit the engine creates carries the canary label. All reads go through
//! this registry, which drops units without the canary, so co-tenant workloads
//! on the same runtime are never listed, inspected, changed or removed.
//!
//! Structured room data is stored as flat labels:
//!
//! | label              | value                                  |
//! |--------------------|----------------------------------------|
//! | `rooms.canary`     | `room-orchestrator`                    |
//! | `rooms.name`       | room name                              |
//! | `rooms.url`        | public URL                             |
//! | `rooms.epr`        | port range, `start-end`                |
//! | `rooms.envs`       | comma separated user env variable keys |
//! | `rooms.user.<key>` | user label                             |

use std::collections::BTreeMap;
use std::sync::Arc;

use room_ports::PortRange;
use room_runtime::{ContainerRuntime, UnitDetails, UnitSummary};
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};
use crate::settings::check_label_key;

pub const LABEL_CANARY: &str = "rooms.canary";
pub const CANARY_VALUE: &str = "room-orchestrator";
pub const LABEL_NAME: &str = "rooms.name";
pub const LABEL_URL: &str = "rooms.url";
pub const LABEL_EPR: &str = "rooms.epr";
pub const LABEL_ENVS: &str = "rooms.envs";
pub const USER_LABEL_PREFIX: &str = "rooms.user.";

pub fn is_owned(labels: &BTreeMap<String, String>) -> bool {
    labels.get(LABEL_CANARY).map(String::as_str) == Some(CANARY_VALUE)
}

/// Typed view of the engine's labels on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnershipLabels {
    pub name: String,
    pub url: String,
    pub port_range: Option<PortRange>,
    pub env_keys: Vec<String>,
    pub user_labels: BTreeMap<String, String>,
}

impl OwnershipLabels {
    pub fn to_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::from([
            (LABEL_CANARY.to_string(), CANARY_VALUE.to_string()),
            (LABEL_NAME.to_string(), self.name.clone()),
            (LABEL_URL.to_string(), self.url.clone()),
            (LABEL_ENVS.to_string(), self.env_keys.join(",")),
        ]);
        if let Some(range) = self.port_range {
            labels.insert(LABEL_EPR.to_string(), range.to_string());
        }
        for (key, value) in &self.user_labels {
            labels.insert(format!("{USER_LABEL_PREFIX}{key}"), value.clone());
        }
        labels
    }

    /// Decodes the engine's labels. Malformed values are dropped with a warning.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let port_range = labels.get(LABEL_EPR).and_then(|raw| match raw.parse() {
            Ok(range) => Some(range),
            Err(e) => {
                warn!(label = LABEL_EPR, value = %raw, "Ignoring malformed port range label: {e}");
                None
            }
        });

        let env_keys = labels
            .get(LABEL_ENVS)
            .map(|raw| {
                raw.split(',')
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let user_labels = labels
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(USER_LABEL_PREFIX)
                    .map(|key| (key.to_string(), v.clone()))
            })
            .collect();

        Self {
            name: labels.get(LABEL_NAME).cloned().unwrap_or_default(),
            url: labels.get(LABEL_URL).cloned().unwrap_or_default(),
            port_range,
            env_keys,
            user_labels,
        }
    }
}

/// Validates a user label filter and turns it into runtime label selectors.
/// Keys are matched case-insensitively.
pub fn label_selectors(filter: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut selectors = BTreeMap::from([(LABEL_CANARY.to_string(), CANARY_VALUE.to_string())]);
    for (key, value) in filter {
        let key = key.to_lowercase();
        if !check_label_key(&key) {
            return Err(OrchestratorError::InvalidLabel(key));
        }
        selectors.insert(format!("{USER_LABEL_PREFIX}{key}"), value.clone());
    }
    Ok(selectors)
}

/// Runtime reads scoped to engine-owned units.
#[derive(Clone)]
pub struct OwnershipRegistry {
    runtime: Arc<dyn ContainerRuntime>,
}

impl OwnershipRegistry {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Owned units carrying every user label in `filter`.
    pub fn list(&self, filter: &BTreeMap<String, String>) -> Result<Vec<UnitSummary>> {
        let selectors = label_selectors(filter)?;
        let units = self.runtime.list(&selectors)?;

        // the runtime filter is trusted, but ownership is re-checked locally
        Ok(units.into_iter().filter(|u| is_owned(&u.labels)).collect())
    }

    /// Inspects an owned unit. Units without the canary are reported as `NotFound`.
    pub fn inspect(&self, id: &str) -> Result<UnitDetails> {
        let details = self.runtime.inspect(id)?;
        if !is_owned(details.labels()) {
            debug!(id, "Unit exists but is not owned by the orchestrator");
            return Err(OrchestratorError::NotFound(id.to_string()));
        }
        Ok(details)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<UnitSummary>> {
        let selectors = BTreeMap::from([
            (LABEL_CANARY.to_string(), CANARY_VALUE.to_string()),
            (LABEL_NAME.to_string(), name.to_string()),
        ]);
        Ok(self
            .runtime
            .list(&selectors)?
            .into_iter()
            .find(|u| is_owned(&u.labels) && u.labels.get(LABEL_NAME).map(String::as_str) == Some(name)))
    }

    /// Port ranges held by owned units, running or not.
    pub fn claimed_ranges(&self) -> Result<Vec<PortRange>> {
        Ok(self
            .list(&BTreeMap::new())?
            .iter()
            .filter_map(|u| OwnershipLabels::from_labels(&u.labels).port_range)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_runtime::mock::MockRuntime;

    fn owned_labels(name: &str, epr: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_CANARY.to_string(), CANARY_VALUE.to_string()),
            (LABEL_NAME.to_string(), name.to_string()),
            (LABEL_EPR.to_string(), epr.to_string()),
        ])
    }

    #[test]
    fn test_labels_round_trip() {
        let labels = OwnershipLabels {
            name: "alpha".to_string(),
            url: "https://neko.lan/alpha/".to_string(),
            port_range: Some(PortRange::new(59000, 59009).unwrap()),
            env_keys: vec!["TZ".to_string(), "LANG".to_string()],
            user_labels: BTreeMap::from([("team".to_string(), "blue".to_string())]),
        };

        let encoded = labels.to_labels();
        assert_eq!(encoded[LABEL_EPR], "59000-59009");
        assert_eq!(encoded["rooms.user.team"], "blue");
        assert!(is_owned(&encoded));
        assert_eq!(OwnershipLabels::from_labels(&encoded), labels);
    }

    #[test]
    fn test_malformed_port_range_is_dropped() {
        let decoded = OwnershipLabels::from_labels(&owned_labels("a", "59009-59000"));
        assert_eq!(decoded.port_range, None);
        assert_eq!(decoded.name, "a");
    }

    #[test]
    fn test_canary_value_must_match() {
        let mut labels = owned_labels("a", "1-2");
        labels.insert(LABEL_CANARY.to_string(), "someone-else".to_string());
        assert!(!is_owned(&labels));
        assert!(!is_owned(&BTreeMap::new()));
    }

    #[test]
    fn test_invalid_filter_key_never_reaches_runtime() {
        let runtime = Arc::new(MockRuntime::new());
        let registry = OwnershipRegistry::new(runtime.clone());

        for key in ["with space", "a_b", "", "ключ", "slash/key"] {
            let filter = BTreeMap::from([(key.to_string(), "x".to_string())]);
            assert_eq!(
                registry.list(&filter).unwrap_err(),
                OrchestratorError::InvalidLabel(key.to_string())
            );
        }
        assert_eq!(runtime.call_count(), 0);

        // uppercase is normalized, not rejected
        let filter = BTreeMap::from([("Team".to_string(), "blue".to_string())]);
        assert!(registry.list(&filter).unwrap().is_empty());
        assert_eq!(runtime.calls(), vec!["list"]);
    }

    #[test]
    fn test_filter_keys_are_lowercased() {
        let filter = BTreeMap::from([("Team".to_string(), "Blue".to_string())]);
        let selectors = label_selectors(&filter).unwrap();
        assert_eq!(selectors["rooms.user.team"], "Blue");
        assert!(selectors.contains_key(LABEL_CANARY));
    }

    #[test]
    fn test_foreign_units_are_invisible() {
        let runtime = Arc::new(MockRuntime::new());
        let registry = OwnershipRegistry::new(runtime.clone());

        let foreign = runtime.insert_foreign("web", BTreeMap::new());
        let spoofed = runtime.insert_foreign(
            "spoof",
            BTreeMap::from([(LABEL_CANARY.to_string(), "nope".to_string())]),
        );
        let owned = runtime.insert_foreign("rooms-a", owned_labels("a", "59000-59009"));

        let listed = registry.list(&BTreeMap::new()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, owned);

        assert_eq!(
            registry.inspect(&foreign).unwrap_err(),
            OrchestratorError::NotFound(foreign.clone())
        );
        assert!(matches!(
            registry.inspect(&spoofed),
            Err(OrchestratorError::NotFound(_))
        ));
        assert!(registry.inspect(&owned).is_ok());
    }

    #[test]
    fn test_claimed_ranges_and_find_by_name() {
        let runtime = Arc::new(MockRuntime::new());
        let registry = OwnershipRegistry::new(runtime.clone());

        runtime.insert_foreign("rooms-a", owned_labels("a", "59000-59009"));
        runtime.insert_foreign("rooms-b", owned_labels("b", "59010-59014"));
        runtime.insert_foreign("rooms-c", owned_labels("c", "broken"));
        runtime.insert_foreign("web", BTreeMap::from([(LABEL_EPR.to_string(), "1-2".to_string())]));

        let mut ranges = registry.claimed_ranges().unwrap();
        ranges.sort();
        assert_eq!(
            ranges,
            vec![
                PortRange::new(59000, 59009).unwrap(),
                PortRange::new(59010, 59014).unwrap()
            ]
        );

        assert_eq!(registry.find_by_name("b").unwrap().unwrap().name, "rooms-b");
        assert!(registry.find_by_name("web").unwrap().is_none());
    }
}
