//! Docker implementation of the runtime adapter, driven through the `docker` CLI.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{Result, RuntimeError};
use crate::types::{UnitDetails, UnitSpec, UnitStats, UnitSummary};
use crate::ContainerRuntime;

pub mod command;
pub mod parse;

pub use command::DockerCommand;

/// Talks to the local Docker daemon via the CLI.
#[derive(Debug, Clone, Default)]
pub struct DockerRuntime;

impl DockerRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Verifies the daemon answers; used once at startup.
    pub fn check_daemon_running(&self) -> Result<()> {
        DockerCommand::new()
            .subcommand("version")
            .args(["--format", "{{.Server.Version}}"])
            .execute_with_output()
            .map(|version| info!(version = version.trim(), "Connected to Docker daemon"))
            .map_err(|e| match e {
                RuntimeError::Unavailable(_) => e,
                other => RuntimeError::Unavailable(other.to_string()),
            })
    }

    fn inspect_many(&self, ids: &[String]) -> Result<Vec<UnitDetails>> {
        let output = DockerCommand::new()
            .subcommand("inspect")
            .args(["--type", "container"])
            .args(ids.iter().cloned())
            .execute_with_output()?;
        parse::parse_inspect(&output)
    }
}

/// Arguments for `docker create` built from a unit spec.
pub fn create_args(spec: &UnitSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--hostname".to_string(),
        spec.hostname.clone(),
        "--restart".to_string(),
        spec.restart_policy.clone(),
        "--log-driver".to_string(),
        "json-file".to_string(),
    ];

    if !spec.network.is_empty() {
        args.push("--network".to_string());
        args.push(spec.network.clone());
    }

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }

    for entry in &spec.env {
        args.push("--env".to_string());
        args.push(entry.clone());
    }

    for port in &spec.ports {
        match port.host_port {
            Some(host) => {
                args.push("--publish".to_string());
                args.push(format!(
                    "{host}:{}/{}",
                    port.container_port, port.protocol
                ));
            }
            None => {
                args.push("--expose".to_string());
                args.push(format!("{}/{}", port.container_port, port.protocol));
            }
        }
    }

    for cap in &spec.cap_add {
        args.push("--cap-add".to_string());
        args.push(cap.clone());
    }

    let resources = &spec.resources;
    if resources.shm_size > 0 {
        args.push("--shm-size".to_string());
        args.push(resources.shm_size.to_string());
    }
    if resources.cpu_shares > 0 {
        args.push("--cpu-shares".to_string());
        args.push(resources.cpu_shares.to_string());
    }
    if resources.nano_cpus > 0 {
        args.push("--cpus".to_string());
        args.push(format!("{}", resources.nano_cpus as f64 / 1e9));
    }
    if resources.memory > 0 {
        args.push("--memory".to_string());
        args.push(resources.memory.to_string());
    }

    args.push(spec.image.clone());
    args
}

impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn list(&self, labels: &BTreeMap<String, String>) -> Result<Vec<UnitSummary>> {
        let mut cmd = DockerCommand::new()
            .subcommand("ps")
            .args(["--all", "--quiet", "--no-trunc"]);
        for (key, value) in labels {
            cmd = cmd.arg("--filter").arg(format!("label={key}={value}"));
        }

        let ids: Vec<String> = cmd
            .execute_with_output()?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // A unit may vanish between `ps` and `inspect`; fall back to one-by-one
        let details = match self.inspect_many(&ids) {
            Ok(details) => details,
            Err(RuntimeError::NotFound(_)) => {
                debug!("Unit disappeared during listing, inspecting individually");
                let mut details = Vec::with_capacity(ids.len());
                for id in &ids {
                    match self.inspect(id) {
                        Ok(d) => details.push(d),
                        Err(RuntimeError::NotFound(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                details
            }
            Err(e) => return Err(e),
        };

        Ok(details.into_iter().map(|d| d.summary).collect())
    }

    fn inspect(&self, id: &str) -> Result<UnitDetails> {
        self.inspect_many(&[id.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    fn create(&self, spec: &UnitSpec) -> Result<String> {
        let output = DockerCommand::new()
            .args(create_args(spec))
            .execute_with_output()?;

        let id = output.trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::Parse(
                "docker create printed no container id".to_string(),
            ));
        }
        Ok(id)
    }

    fn start(&self, id: &str) -> Result<()> {
        DockerCommand::new().subcommand("start").arg(id).execute()
    }

    fn stop(&self, id: &str) -> Result<()> {
        DockerCommand::new().subcommand("stop").arg(id).execute()
    }

    fn remove(&self, id: &str, remove_volumes: bool) -> Result<()> {
        let mut cmd = DockerCommand::new().subcommand("rm").arg("--force");
        if remove_volumes {
            cmd = cmd.arg("--volumes");
        }
        cmd.arg(id).execute()
    }

    fn stats(&self, id: &str) -> Result<UnitStats> {
        let output = DockerCommand::new()
            .subcommand("stats")
            .args(["--no-stream", "--no-trunc", "--format", "{{json .}}"])
            .arg(id)
            .execute_with_output()?;
        parse::parse_stats(&output)
    }
}
