//! Error types for container runtime operations.

use thiserror::Error;

/// Errors that can occur while talking to the container runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("No such unit: {0}")]
    NotFound(String),

    #[error("Port already allocated: {0}")]
    PortConflict(String),

    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected runtime output: {0}")]
    Parse(String),
}

impl RuntimeError {
    /// Classify a failed docker invocation by its stderr text.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("no such container") || lower.contains("no such object") {
            Self::NotFound(message)
        } else if lower.contains("port is already allocated")
            || lower.contains("address already in use")
        {
            Self::PortConflict(message)
        } else if lower.contains("cannot connect to the docker daemon")
            || lower.contains("is the docker daemon running")
            || lower.contains("permission denied while trying to connect")
        {
            Self::Unavailable(message)
        } else {
            Self::CommandFailed(message)
        }
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stderr() {
        assert!(matches!(
            RuntimeError::from_stderr("Error: No such container: abc"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            RuntimeError::from_stderr("Error: No such object: abc"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            RuntimeError::from_stderr(
                "driver failed programming external connectivity: Bind for 0.0.0.0:59000 failed: port is already allocated"
            ),
            RuntimeError::PortConflict(_)
        ));
        assert!(matches!(
            RuntimeError::from_stderr(
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"
            ),
            RuntimeError::Unavailable(_)
        ));
        assert!(matches!(
            RuntimeError::from_stderr("Unable to find image 'nope:latest' locally"),
            RuntimeError::CommandFailed(_)
        ));
    }
}
