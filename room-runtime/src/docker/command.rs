//! Docker command abstraction and builder utilities.
//!
//! This module provides a centralized interface for executing Docker commands
//! with consistent error classification and logging. Every failure is turned
//! into a `RuntimeError` so callers never see raw process errors.

use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};

/// Builder for Docker commands with fluent interface and consistent error handling.
#[derive(Debug, Clone, Default)]
pub struct DockerCommand {
    subcommand: Option<String>,
    args: Vec<String>,
}

impl DockerCommand {
    /// Create a new Docker command builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Docker subcommand (e.g., "ps", "inspect", "create").
    pub fn subcommand<S: Into<String>>(mut self, cmd: S) -> Self {
        self.subcommand = Some(cmd.into());
        self
    }

    /// Add a single argument to the command.
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector passed to the `docker` binary.
    pub fn argv(&self) -> Vec<String> {
        self.subcommand
            .iter()
            .cloned()
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Execute the command, discarding its output.
    pub fn execute(self) -> Result<()> {
        self.execute_with_output().map(|_| ())
    }

    /// Execute the command and return its stdout.
    ///
    /// A missing `docker` binary is reported as `Unavailable`; a non-zero exit
    /// is classified from stderr.
    pub fn execute_with_output(self) -> Result<String> {
        let argv = self.argv();
        debug!(args = ?argv, "Executing Docker command");

        let output = duct::cmd("docker", &argv)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| {
                RuntimeError::Unavailable(format!("Failed to execute Docker command: {e}"))
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                subcommand = self.subcommand.as_deref().unwrap_or_default(),
                status = %output.status,
                "Docker command failed: {}",
                stderr.trim()
            );
            Err(RuntimeError::from_stderr(&stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_command_builder() {
        let cmd = DockerCommand::new()
            .subcommand("ps")
            .arg("-a")
            .args(["--filter", "label=rooms.canary=room-orchestrator"]);

        assert_eq!(
            cmd.argv(),
            vec!["ps", "-a", "--filter", "label=rooms.canary=room-orchestrator"]
        );
    }

    #[test]
    fn test_docker_command_without_subcommand() {
        let cmd = DockerCommand::new().arg("--version");
        assert_eq!(cmd.argv(), vec!["--version"]);
    }
}
