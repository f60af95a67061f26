//! Traefik label generation for path-based routing to rooms.
//!
//! Each room is reached at `https://<domain>/<prefix>/<name>/`. Rule keys are
//! namespaced by the room's container name so many rooms can share one proxy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Global reverse-proxy settings shared by every room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub domain: String,
    pub entrypoint: String,
    /// TLS is enabled only when a certificate resolver is configured.
    pub cert_resolver: Option<String>,
    /// Docker network the proxy and the rooms share.
    pub network: String,
    /// Optional path under which all rooms are mounted, e.g. "rooms".
    pub path_prefix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            domain: "neko.lan".to_string(),
            entrypoint: "web-secure".to_string(),
            cert_resolver: Some("lets-encrypt".to_string()),
            network: "traefik".to_string(),
            path_prefix: String::new(),
        }
    }
}

impl RoutingConfig {
    pub fn tls_resolver(&self) -> Option<&str> {
        self.cert_resolver.as_deref().filter(|r| !r.is_empty())
    }

    /// Path segment of a room without leading or trailing slashes.
    pub fn room_path(&self, room_name: &str) -> String {
        let prefix = self.path_prefix.trim_matches('/');
        if prefix.is_empty() {
            room_name.to_string()
        } else {
            format!("{prefix}/{room_name}")
        }
    }

    pub fn room_url(&self, room_name: &str) -> String {
        let scheme = if self.tls_resolver().is_some() {
            "https"
        } else {
            "http"
        };
        format!("{scheme}://{}/{}/", self.domain, self.room_path(room_name))
    }
}

/// Builds the proxy labels routing `/<path>` to `frontend_port` of `container_name`.
pub fn build_rules(
    path: &str,
    container_name: &str,
    frontend_port: u16,
    routing: &RoutingConfig,
) -> BTreeMap<String, String> {
    let path = path.trim_matches('/');
    let c = container_name;

    let mut labels = BTreeMap::from([
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("traefik.http.services.{c}-frontend.loadbalancer.server.port"),
            frontend_port.to_string(),
        ),
        (
            format!("traefik.http.routers.{c}.entrypoints"),
            routing.entrypoint.clone(),
        ),
        (
            format!("traefik.http.routers.{c}.rule"),
            format!("Host(`{}`) && PathPrefix(`/{path}`)", routing.domain),
        ),
        (
            format!("traefik.http.middlewares.{c}-rdr.redirectregex.regex"),
            format!("/{path}$"),
        ),
        (
            format!("traefik.http.middlewares.{c}-rdr.redirectregex.replacement"),
            format!("/{path}/"),
        ),
        (
            format!("traefik.http.middlewares.{c}-prf.stripprefix.prefixes"),
            format!("/{path}/"),
        ),
        (
            format!("traefik.http.routers.{c}.middlewares"),
            format!("{c}-rdr,{c}-prf"),
        ),
    ]);

    if let Some(resolver) = routing.tls_resolver() {
        labels.insert(format!("traefik.http.routers.{c}.tls"), "true".to_string());
        labels.insert(
            format!("traefik.http.routers.{c}.tls.certresolver"),
            resolver.to_string(),
        );
    }

    labels
}
