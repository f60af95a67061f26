//! Integration tests for room-orchestrator
//!
//! Drives full room lifecycles through the in-memory runtime: ownership
//! scoping, port allocation under contention, recreate semantics and removal.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use room_orchestrator::registry::{CANARY_VALUE, LABEL_CANARY, LABEL_EPR, LABEL_NAME};
use room_orchestrator::{OrchestratorError, RoomAction, RoomConfig, RoomManager, RoomSettings};
use room_ports::PortRange;
use room_runtime::mock::MockRuntime;
use room_runtime::{
    ContainerRuntime, Result as RuntimeResult, RuntimeError, UnitDetails, UnitSpec, UnitStats,
    UnitSummary,
};
use serde_json::json;

fn setup(pool: &str) -> (RoomManager, Arc<MockRuntime>) {
    let runtime = Arc::new(MockRuntime::new());
    let config = RoomConfig {
        ephemeral_pool: pool.parse().expect("valid pool"),
        ..Default::default()
    };
    (RoomManager::new(config, runtime.clone()), runtime)
}

fn room(name: &str, max_connections: u16) -> RoomSettings {
    RoomSettings {
        name: name.to_string(),
        max_connections,
        ..Default::default()
    }
}

#[test]
fn test_full_lifecycle() {
    let (manager, runtime) = setup("59000-59999");

    let id = manager.create(room("alpha", 5)).unwrap();
    assert!(!manager.get_entry(&id).unwrap().running);

    manager.perform(&id, RoomAction::Start).unwrap();
    assert!(manager.get_entry(&id).unwrap().running);
    // starting twice is fine
    manager.start(&id).unwrap();

    manager.perform(&id, RoomAction::Stop).unwrap();
    manager.stop(&id).unwrap();
    let entry = manager.get_entry_by_name("alpha").unwrap();
    assert_eq!(entry.id, id);
    assert!(!entry.running);

    manager.perform(&id, RoomAction::Remove).unwrap();
    assert_eq!(runtime.unit_count(), 0);
    assert!(matches!(
        manager.get_entry(&id),
        Err(OrchestratorError::NotFound(_))
    ));
}

#[test]
fn test_invalid_label_filter_makes_no_runtime_calls() {
    let (manager, runtime) = setup("59000-59999");

    let filter = BTreeMap::from([("bad key!".to_string(), "x".to_string())]);
    assert_eq!(
        manager.list(&filter).unwrap_err(),
        OrchestratorError::InvalidLabel("bad key!".to_string())
    );
    assert_eq!(runtime.call_count(), 0);
}

#[test]
fn test_list_filters_by_user_labels() {
    let (manager, _) = setup("59000-59999");

    let blue = RoomSettings {
        labels: BTreeMap::from([("team".to_string(), "blue".to_string())]),
        ..room("blue", 2)
    };
    manager.create(blue).unwrap();
    manager.create(room("plain", 2)).unwrap();

    assert_eq!(manager.list(&BTreeMap::new()).unwrap().len(), 2);

    let filter = BTreeMap::from([("TEAM".to_string(), "blue".to_string())]);
    let listed = manager.list(&filter).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "blue");
    assert_eq!(listed[0].labels["team"], "blue");
}

#[test]
fn test_allocations_are_disjoint_until_pool_exhausted() {
    // 23 ports, width 5: four rooms fit, the fifth does not
    let (manager, runtime) = setup("40000-40022");

    let mut ranges: Vec<PortRange> = Vec::new();
    for i in 0..4 {
        let id = manager.create(room(&format!("r{i}"), 5)).unwrap();
        ranges.push(manager.get_entry(&id).unwrap().port_range.unwrap());
    }
    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps_with(b), "{a} overlaps {b}");
        }
    }

    let before = runtime.unit_count();
    assert!(matches!(
        manager.create(room("r4", 5)),
        Err(OrchestratorError::PoolExhausted(_))
    ));
    assert_eq!(runtime.unit_count(), before);

    // the 3 remaining ports still serve a narrower room
    let id = manager.create(room("small", 3)).unwrap();
    assert_eq!(
        manager.get_entry(&id).unwrap().port_range.unwrap().to_string(),
        "40020-40022"
    );
}

#[test]
fn test_removed_room_frees_its_ports() {
    let (manager, _) = setup("40000-40009");

    let a = manager.create(room("a", 10)).unwrap();
    assert!(manager.create(room("b", 10)).is_err());

    manager.remove(&a).unwrap();
    manager.create(room("b", 10)).unwrap();
}

#[test]
fn test_stopped_rooms_keep_their_ports() {
    let (manager, _) = setup("40000-40009");

    let a = manager.create(room("a", 10)).unwrap();
    manager.start(&a).unwrap();
    manager.stop(&a).unwrap();

    assert!(matches!(
        manager.create(room("b", 1)),
        Err(OrchestratorError::PoolExhausted(_))
    ));
}

#[test]
fn test_recreate_preserves_running_state() {
    let (manager, _) = setup("59000-59999");

    let running = manager.create(room("running", 2)).unwrap();
    manager.start(&running).unwrap();
    let stopped = manager.create(room("stopped", 2)).unwrap();

    let running = manager.recreate(&running, None).unwrap();
    let stopped = manager.recreate(&stopped, None).unwrap();

    assert!(manager.get_entry(&running).unwrap().running);
    assert!(!manager.get_entry(&stopped).unwrap().running);
}

#[test]
fn test_recreate_merges_partial_override() {
    let (manager, _) = setup("59000-59999");

    let settings = RoomSettings {
        user_pass: "neko".to_string(),
        admin_pass: "admin".to_string(),
        envs: BTreeMap::from([("TZ".to_string(), "UTC".to_string())]),
        ..room("alpha", 10)
    };
    let id = manager.create(settings).unwrap();

    let new_id = manager
        .recreate(&id, Some(&json!({"maxConnections": 20})))
        .unwrap();

    let merged = manager.get_settings(&new_id).unwrap();
    assert_eq!(merged.max_connections, 20);
    assert_eq!(merged.name, "alpha");
    assert_eq!(merged.user_pass, "neko");
    assert_eq!(merged.admin_pass, "admin");
    assert_eq!(merged.envs["TZ"], "UTC");
    assert_eq!(merged.resources.shm_size, 2_000_000_000);

    let entry = manager.get_entry(&new_id).unwrap();
    assert_eq!(entry.max_connections, 20);
    assert_eq!(entry.port_range.unwrap().size(), 20);
    assert!(manager.get_entry(&id).is_err());
}

#[test]
fn test_foreign_units_are_not_found() {
    let (manager, runtime) = setup("59000-59999");
    let foreign = runtime.insert_foreign("postgres", BTreeMap::new());

    assert!(manager.list(&BTreeMap::new()).unwrap().is_empty());
    for result in [
        manager.get_entry(&foreign).map(|_| ()),
        manager.get_settings(&foreign).map(|_| ()),
        manager.get_stats(&foreign).map(|_| ()),
        manager.start(&foreign),
        manager.stop(&foreign),
        manager.remove(&foreign),
        manager.recreate(&foreign, None).map(|_| ()),
    ] {
        assert_eq!(result, Err(OrchestratorError::NotFound(foreign.clone())));
    }

    // still there and still running
    assert!(runtime.unit(&foreign).unwrap().running());
    assert!(!runtime.calls().iter().any(|c| c == "stop" || c == "remove"));
}

#[test]
fn test_remove_absent_room_is_not_found() {
    let (manager, _) = setup("59000-59999");
    assert_eq!(
        manager.remove("does-not-exist"),
        Err(OrchestratorError::NotFound("does-not-exist".to_string()))
    );
}

#[test]
fn test_remove_running_room_stops_first() {
    let (manager, runtime) = setup("59000-59999");
    let id = manager.create(room("alpha", 2)).unwrap();
    manager.start(&id).unwrap();
    runtime.clear_calls();

    manager.remove(&id).unwrap();
    assert_eq!(runtime.calls(), vec!["inspect", "stop", "remove"]);
}

#[test]
fn test_bind_conflict_surfaces_as_port_conflict() {
    let (manager, runtime) = setup("59000-59999");
    let id = manager.create(room("alpha", 2)).unwrap();

    // an outside process grabbed the ports between allocation and start
    runtime.fail_next(
        "start",
        RuntimeError::PortConflict("Bind for 0.0.0.0:59000 failed".to_string()),
    );
    let err = manager.start(&id).unwrap_err();
    assert!(matches!(err, OrchestratorError::PortConflict(_)));
    assert!(err.is_retryable());

    // no internal retry happened; the caller's retry succeeds
    manager.start(&id).unwrap();
}

#[test]
fn test_create_and_start_after_port_conflict_rescans() {
    let (manager, runtime) = setup("59000-59999");
    runtime.fail_next(
        "start",
        RuntimeError::PortConflict("Bind for 0.0.0.0:59000 failed".to_string()),
    );

    let err = manager.create_and_start(room("alpha", 2)).unwrap_err();
    assert!(matches!(err, OrchestratorError::PortConflict(_)));
    assert_eq!(runtime.unit_count(), 0);

    let id = manager.create_and_start(room("alpha", 2)).unwrap();
    let entry = manager.get_entry(&id).unwrap();
    assert!(entry.running);
    assert_eq!(entry.port_range.unwrap().to_string(), "59000-59001");
}

#[test]
fn test_create_and_start_keeps_room_on_other_failures() {
    let (manager, runtime) = setup("59000-59999");
    runtime.fail_next("start", RuntimeError::CommandFailed("oci runtime error".to_string()));

    assert!(matches!(
        manager.create_and_start(room("alpha", 2)),
        Err(OrchestratorError::Runtime(_))
    ));
    assert!(!manager.get_entry_by_name("alpha").unwrap().running);
}

#[test]
fn test_concurrent_creates_get_disjoint_ranges() {
    // 60 ports, width 7: eight rooms fit, the rest exhaust the pool
    let (manager, runtime) = setup("41000-41059");
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.create(room(&format!("c{i}"), 7)))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 8);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, OrchestratorError::PoolExhausted(_))));

    let ranges: Vec<PortRange> = manager
        .list(&BTreeMap::new())
        .unwrap()
        .into_iter()
        .filter_map(|r| r.port_range)
        .collect();
    assert_eq!(ranges.len(), runtime.unit_count());
    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps_with(b), "{a} overlaps {b}");
        }
    }
}

/// Lets another orchestrator claim a range right before the next create.
struct RivalRuntime {
    inner: Arc<MockRuntime>,
    rival_epr: Mutex<Option<String>>,
}

impl ContainerRuntime for RivalRuntime {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn list(&self, labels: &BTreeMap<String, String>) -> RuntimeResult<Vec<UnitSummary>> {
        self.inner.list(labels)
    }

    fn inspect(&self, id: &str) -> RuntimeResult<UnitDetails> {
        self.inner.inspect(id)
    }

    fn create(&self, spec: &UnitSpec) -> RuntimeResult<String> {
        if let Some(epr) = self.rival_epr.lock().unwrap().take() {
            self.inner.insert_foreign(
                "rooms-rival",
                BTreeMap::from([
                    (LABEL_CANARY.to_string(), CANARY_VALUE.to_string()),
                    (LABEL_NAME.to_string(), "rival".to_string()),
                    (LABEL_EPR.to_string(), epr),
                ]),
            );
        }
        self.inner.create(spec)
    }

    fn start(&self, id: &str) -> RuntimeResult<()> {
        self.inner.start(id)
    }

    fn stop(&self, id: &str) -> RuntimeResult<()> {
        self.inner.stop(id)
    }

    fn remove(&self, id: &str, remove_volumes: bool) -> RuntimeResult<()> {
        self.inner.remove(id, remove_volumes)
    }

    fn stats(&self, id: &str) -> RuntimeResult<UnitStats> {
        self.inner.stats(id)
    }
}

#[test]
fn test_range_claimed_during_create_yields() {
    let inner = Arc::new(MockRuntime::new());
    let runtime = Arc::new(RivalRuntime {
        inner: inner.clone(),
        rival_epr: Mutex::new(Some("59000-59004".to_string())),
    });
    let manager = RoomManager::new(
        RoomConfig {
            ephemeral_pool: "59000-59999".parse().unwrap(),
            ..Default::default()
        },
        runtime,
    );

    let err = manager.create(room("alpha", 3)).unwrap_err();
    assert!(matches!(err, OrchestratorError::PortConflict(_)));
    // only the rival is left
    assert_eq!(inner.unit_count(), 1);
    assert!(manager.get_entry_by_name("alpha").is_err());

    // the retry scans past the rival's range
    let id = manager.create(room("alpha", 3)).unwrap();
    assert_eq!(
        manager.get_entry(&id).unwrap().port_range.unwrap().to_string(),
        "59005-59007"
    );
}

#[test]
fn test_runtime_down_is_reported() {
    let (manager, runtime) = setup("59000-59999");
    runtime.fail_next(
        "list",
        RuntimeError::Unavailable("Cannot connect to the Docker daemon".to_string()),
    );
    assert!(matches!(
        manager.list(&BTreeMap::new()),
        Err(OrchestratorError::RuntimeUnavailable(_))
    ));
}

#[test]
fn test_settings_survive_the_runtime() {
    let (manager, runtime) = setup("59000-59999");
    let settings = RoomSettings {
        image: "m1k1o/neko:chromium".to_string(),
        user_pass: "neko".to_string(),
        admin_pass: "admin".to_string(),
        control_protection: true,
        implicit_control: true,
        screen: Some("1920x1080@60".to_string()),
        envs: BTreeMap::from([("TZ".to_string(), "Europe/Vienna".to_string())]),
        labels: BTreeMap::from([("owner".to_string(), "qa".to_string())]),
        ..room("alpha", 4)
    };
    let id = manager.create(settings.clone()).unwrap();

    assert_eq!(manager.get_settings(&id).unwrap(), settings);

    let spec = runtime.spec(&id).unwrap();
    assert!(spec.env.contains(&"NEKO_EPR=59000-59003".to_string()));
    assert_eq!(runtime.name(), "mock");
}
