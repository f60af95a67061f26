use std::net::IpAddr;
use std::time::Duration;

use room_orchestrator::config::{
    parse_ephemeral_pool, DEFAULT_EPHEMERAL_POOL, DEFAULT_IMAGE, DEFAULT_INSTANCE_NAME,
};
use room_orchestrator::{RoomConfig, RoutingConfig};
use tracing::{debug, warn};

pub const PUBLIC_IP_URL: &str = "https://checkip.amazonaws.com";
const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    /// Ephemeral port pool, `MIN-MAX`.
    pub epr: String,
    /// Addresses announced for 1:1 NAT. Detected at startup when empty.
    pub nat1to1: Vec<String>,
    pub image: String,
    pub instance_name: String,
    pub traefik_domain: String,
    pub traefik_entrypoint: String,
    /// Empty disables TLS on room routers.
    pub traefik_certresolver: String,
    pub traefik_network: String,
    pub path_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every `ROOMS_*` key through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let routing = RoutingConfig::default();
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            bind_addr: get("ROOMS_BIND", "0.0.0.0:8080"),
            epr: get("ROOMS_EPR", DEFAULT_EPHEMERAL_POOL),
            nat1to1: lookup("ROOMS_NAT1TO1")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            image: get("ROOMS_IMAGE", DEFAULT_IMAGE),
            instance_name: get("ROOMS_INSTANCE_NAME", DEFAULT_INSTANCE_NAME),
            traefik_domain: get("ROOMS_TRAEFIK_DOMAIN", &routing.domain),
            traefik_entrypoint: get("ROOMS_TRAEFIK_ENTRYPOINT", &routing.entrypoint),
            traefik_certresolver: get(
                "ROOMS_TRAEFIK_CERTRESOLVER",
                routing.cert_resolver.as_deref().unwrap_or_default(),
            ),
            traefik_network: get("ROOMS_TRAEFIK_NETWORK", &routing.network),
            path_prefix: get("ROOMS_PATH_PREFIX", &routing.path_prefix),
        }
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            nat1to1_ips: self.nat1to1.clone(),
            ephemeral_pool: parse_ephemeral_pool(&self.epr),
            default_image: self.image.clone(),
            instance_name: self.instance_name.clone(),
            routing: RoutingConfig {
                domain: self.traefik_domain.clone(),
                entrypoint: self.traefik_entrypoint.clone(),
                cert_resolver: Some(self.traefik_certresolver.clone()).filter(|r| !r.is_empty()),
                network: self.traefik_network.clone(),
                path_prefix: self.path_prefix.clone(),
            },
        }
    }

    /// Fills `nat1to1` with the detected public address if none was configured.
    /// Detection failures are logged and leave the list empty.
    pub async fn resolve_nat1to1(&mut self) {
        if !self.nat1to1.is_empty() {
            return;
        }
        match detect_public_ip(PUBLIC_IP_URL).await {
            Ok(ip) => {
                debug!(%ip, "Detected public IP");
                self.nat1to1.push(ip.to_string());
            }
            Err(e) => warn!("Public IP detection failed, NAT1TO1 stays unset: {e:#}"),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Asks `url` for this host's public address; the body must be a bare IP.
pub async fn detect_public_ip(url: &str) -> anyhow::Result<IpAddr> {
    let client = reqwest::Client::builder()
        .timeout(PUBLIC_IP_TIMEOUT)
        .build()?;
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body.trim().parse::<IpAddr>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr, "0.0.0.0:8080");
        assert_eq!(c.epr, "59000-59999");
        assert!(c.nat1to1.is_empty());

        let rc = c.room_config();
        assert_eq!(rc, RoomConfig::default());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("ROOMS_EPR", "52100-52000"),
            ("ROOMS_NAT1TO1", " 203.0.113.7, ,198.51.100.2 "),
            ("ROOMS_TRAEFIK_CERTRESOLVER", ""),
            ("ROOMS_PATH_PREFIX", "rooms"),
            ("ROOMS_INSTANCE_NAME", "lab"),
        ]);
        assert_eq!(c.nat1to1, vec!["203.0.113.7", "198.51.100.2"]);

        let rc = c.room_config();
        assert_eq!(rc.ephemeral_pool.to_string(), "52000-52100");
        assert_eq!(rc.routing.cert_resolver, None);
        assert_eq!(rc.routing.room_url("alpha"), "http://neko.lan/rooms/alpha/");
        assert_eq!(rc.container_name("alpha"), "lab-alpha");
    }

    #[tokio::test]
    async fn test_configured_nat_skips_detection() {
        let mut c = config(&[("ROOMS_NAT1TO1", "203.0.113.7")]);
        c.resolve_nat1to1().await;
        assert_eq!(c.nat1to1, vec!["203.0.113.7"]);
    }
}
