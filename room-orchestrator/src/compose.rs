//! docker-compose export of existing rooms.
//!
//! Each service is rendered from the `UnitSpec` the translator rebuilds for the
//! room, so `docker compose up` reproduces the same containers, labels and
//! port bindings.

use std::collections::BTreeMap;

use room_runtime::UnitSpec;
use serde::Serialize;
use serde_yaml_ng as serde_yaml;

use crate::error::{OrchestratorError, Result};

pub const COMPOSE_VERSION: &str = "3.8";

#[derive(Debug, Serialize)]
struct ComposeFile {
    version: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    networks: BTreeMap<String, ComposeNetwork>,
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    name: String,
    external: bool,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    image: String,
    container_name: String,
    hostname: String,
    restart: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cap_add: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shm_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_shares: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mem_limit: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    expose: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

/// Compose interpolates `$`, so literal dollars are doubled.
fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

fn positive(value: i64) -> Option<i64> {
    Some(value).filter(|v| *v > 0)
}

fn service(spec: &UnitSpec, proxy_network: &str) -> ComposeService {
    let mut expose = Vec::new();
    let mut ports = Vec::new();
    for port in &spec.ports {
        match port.host_port {
            Some(host) => ports.push(format!("{host}:{}/{}", port.container_port, port.protocol)),
            None => expose.push(port.container_port.to_string()),
        }
    }

    let r = &spec.resources;
    ComposeService {
        image: spec.image.clone(),
        container_name: spec.name.clone(),
        hostname: spec.hostname.clone(),
        restart: spec.restart_policy.clone(),
        network_mode: Some(spec.network.clone()).filter(|n| n != proxy_network),
        cap_add: spec.cap_add.clone(),
        shm_size: positive(r.shm_size),
        cpu_shares: positive(r.cpu_shares),
        cpus: positive(r.nano_cpus).map(|n| n as f64 / 1e9),
        mem_limit: positive(r.memory),
        expose,
        ports,
        environment: spec.env.iter().map(|e| escape(e)).collect(),
        labels: spec
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), escape(v)))
            .collect(),
    }
}

/// Renders one compose document holding every spec as a service.
///
/// Services on the proxy network join it as the external default network;
/// any other network is kept as `network_mode`.
pub fn render_compose(specs: &[UnitSpec], proxy_network: &str) -> Result<String> {
    let services: BTreeMap<_, _> = specs
        .iter()
        .map(|spec| (spec.name.clone(), service(spec, proxy_network)))
        .collect();

    let mut networks = BTreeMap::new();
    if services.values().any(|s| s.network_mode.is_none()) {
        networks.insert(
            "default".to_string(),
            ComposeNetwork {
                name: proxy_network.to_string(),
                external: true,
            },
        );
    }

    let file = ComposeFile {
        version: COMPOSE_VERSION,
        networks,
        services,
    };
    serde_yaml::to_string(&file)
        .map_err(|e| OrchestratorError::Runtime(format!("failed to render compose file: {e}")))
}
