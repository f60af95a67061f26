//! Translation between `RoomSettings` and runtime `UnitSpec`s.
//!
//! `to_unit_spec` is pure: identical inputs give an identical spec, which is
//! what lets the compose export rebuild specs for rooms that already exist.
//! `settings_from_unit` is its inverse over an inspected unit.

use room_ports::PortRange;
use room_runtime::{ExposedPort, Protocol, ResourceLimits, UnitDetails, UnitSpec};

use crate::config::RoomConfig;
use crate::error::{OrchestratorError, Result};
use crate::registry::OwnershipLabels;
use crate::routing::build_rules;
use crate::settings::{RoomResources, RoomSettings};

/// Port the service inside every room listens on.
pub const FRONTEND_PORT: u16 = 8080;
pub const CAPABILITIES: &[&str] = &["SYS_ADMIN"];
pub const RESTART_POLICY: &str = "unless-stopped";

pub const ENV_BIND: &str = "NEKO_BIND";
pub const ENV_EPR: &str = "NEKO_EPR";
pub const ENV_NAT1TO1: &str = "NEKO_NAT1TO1";
pub const ENV_MAX_CONNECTIONS: &str = "NEKO_MAX_CONNECTIONS";
pub const ENV_PASSWORD: &str = "NEKO_PASSWORD";
pub const ENV_PASSWORD_ADMIN: &str = "NEKO_PASSWORD_ADMIN";
pub const ENV_CONTROL_PROTECTION: &str = "NEKO_CONTROL_PROTECTION";
pub const ENV_IMPLICIT_CONTROL: &str = "NEKO_IMPLICIT_CONTROL";
pub const ENV_SCREEN: &str = "NEKO_SCREEN";

/// Variables the engine sets itself; user `envs` may not override them.
pub const RESERVED_ENV: &[&str] = &[
    ENV_BIND,
    ENV_EPR,
    ENV_NAT1TO1,
    ENV_MAX_CONNECTIONS,
    ENV_PASSWORD,
    ENV_PASSWORD_ADMIN,
    ENV_CONTROL_PROTECTION,
    ENV_IMPLICIT_CONTROL,
    ENV_SCREEN,
];

/// Environment for the service: managed variables first, then user variables by key.
pub fn room_env(settings: &RoomSettings, ports: PortRange, nat_ips: &[String]) -> Vec<String> {
    let mut env = vec![
        format!("{ENV_BIND}=:{FRONTEND_PORT}"),
        format!("{ENV_EPR}={ports}"),
    ];

    let nat_ips: Vec<&str> = nat_ips
        .iter()
        .map(|ip| ip.trim())
        .filter(|ip| !ip.is_empty())
        .collect();
    if !nat_ips.is_empty() {
        env.push(format!("{ENV_NAT1TO1}={}", nat_ips.join(",")));
    }

    env.push(format!("{ENV_MAX_CONNECTIONS}={}", settings.max_connections));
    env.push(format!("{ENV_PASSWORD}={}", settings.user_pass));
    env.push(format!("{ENV_PASSWORD_ADMIN}={}", settings.admin_pass));
    env.push(format!(
        "{ENV_CONTROL_PROTECTION}={}",
        settings.control_protection
    ));
    env.push(format!("{ENV_IMPLICIT_CONTROL}={}", settings.implicit_control));
    if let Some(screen) = &settings.screen {
        env.push(format!("{ENV_SCREEN}={screen}"));
    }

    // BTreeMap iterates in key order
    env.extend(settings.envs.iter().map(|(k, v)| format!("{k}={v}")));
    env
}

/// Builds the runtime spec of a room. `settings.name` must already be set.
pub fn to_unit_spec(settings: &RoomSettings, ports: PortRange, config: &RoomConfig) -> Result<UnitSpec> {
    settings.validate(RESERVED_ENV)?;
    if settings.name.is_empty() {
        return Err(OrchestratorError::InvalidSettings(
            "room name is required".to_string(),
        ));
    }

    let container_name = config.container_name(&settings.name);
    let room_path = config.routing.room_path(&settings.name);

    let mut labels = OwnershipLabels {
        name: settings.name.clone(),
        url: config.routing.room_url(&settings.name),
        port_range: Some(ports),
        env_keys: settings.envs.keys().cloned().collect(),
        user_labels: settings.labels.clone(),
    }
    .to_labels();
    labels.extend(build_rules(
        &room_path,
        &container_name,
        FRONTEND_PORT,
        &config.routing,
    ));

    let mut exposed = vec![ExposedPort::internal(FRONTEND_PORT, Protocol::Tcp)];
    exposed.extend(ports.ports().map(|p| ExposedPort::published(p, Protocol::Udp)));

    let image = if settings.image.is_empty() {
        config.default_image.clone()
    } else {
        settings.image.clone()
    };

    Ok(UnitSpec {
        name: container_name.clone(),
        hostname: container_name,
        image,
        env: room_env(settings, ports, &config.nat1to1_ips),
        labels,
        ports: exposed,
        cap_add: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        resources: ResourceLimits {
            cpu_shares: settings.resources.cpu_shares,
            nano_cpus: settings.resources.nano_cpus,
            memory: settings.resources.memory,
            shm_size: settings.resources.shm_size,
        },
        network: settings
            .network_mode
            .clone()
            .unwrap_or_else(|| config.routing.network.clone()),
        restart_policy: RESTART_POLICY.to_string(),
    })
}

/// Recovers the settings a unit was created from.
pub fn settings_from_unit(details: &UnitDetails, config: &RoomConfig) -> RoomSettings {
    let owned = OwnershipLabels::from_labels(details.labels());
    let env = |key: &str| details.env_var(key).map(str::to_string);
    let flag = |key: &str| details.env_var(key) == Some("true");

    let max_connections = env(ENV_MAX_CONNECTIONS)
        .and_then(|v| v.parse().ok())
        .or_else(|| owned.port_range.and_then(|r| u16::try_from(r.size()).ok()))
        .unwrap_or_default();

    let envs = owned
        .env_keys
        .iter()
        .filter_map(|key| env(key).map(|value| (key.clone(), value)))
        .collect();

    let network_mode = Some(details.network.clone())
        .filter(|n| !n.is_empty() && *n != config.routing.network);

    RoomSettings {
        name: owned.name,
        image: details.summary.image.clone(),
        max_connections,
        user_pass: env(ENV_PASSWORD).unwrap_or_default(),
        admin_pass: env(ENV_PASSWORD_ADMIN).unwrap_or_default(),
        control_protection: flag(ENV_CONTROL_PROTECTION),
        implicit_control: flag(ENV_IMPLICIT_CONTROL),
        screen: env(ENV_SCREEN),
        envs,
        resources: RoomResources {
            cpu_shares: details.resources.cpu_shares,
            nano_cpus: details.resources.nano_cpus,
            memory: details.resources.memory,
            shm_size: details.resources.shm_size,
        },
        network_mode,
        labels: owned.user_labels,
    }
}
