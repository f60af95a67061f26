use room_ports::PortError;
use room_runtime::RuntimeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid label name: {0:?}, allowed characters: [a-z0-9.-]")]
    InvalidLabel(String),

    #[error("Room not found: {0}")]
    NotFound(String),

    #[error("Port pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Port conflict, retry the request: {0}")]
    PortConflict(String),

    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Recreate failed after room {id} was removed, the room is gone: {reason}")]
    RecreateFailed { id: String, reason: String },
}

impl OrchestratorError {
    /// Caller input was malformed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSettings(_) | Self::InvalidLabel(_) | Self::NotFound(_)
        )
    }

    /// The same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted(_) | Self::PortConflict(_))
    }
}

impl From<RuntimeError> for OrchestratorError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(id) => OrchestratorError::NotFound(id),
            RuntimeError::PortConflict(msg) => OrchestratorError::PortConflict(msg),
            RuntimeError::Unavailable(msg) => OrchestratorError::RuntimeUnavailable(msg),
            RuntimeError::CommandFailed(msg) | RuntimeError::Parse(msg) => {
                OrchestratorError::Runtime(msg)
            }
        }
    }
}

impl From<PortError> for OrchestratorError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::PoolExhausted { .. } => OrchestratorError::PoolExhausted(err.to_string()),
            other => OrchestratorError::InvalidSettings(other.to_string()),
        }
    }
}
