//! Error types for the agent lifecycle.

use crate::session::TransportError;

/// Errors that can occur while configuring or running the agent.
#[derive(Debug)]
pub enum AgentError {
    /// Invalid or unreadable configuration.
    Config(String),

    /// The session failed in a way the agent cannot recover from.
    Transport(TransportError),

    /// A background task failed to complete.
    Task(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Transport(e) => write!(f, "session failed: {}", e),
            Self::Task(msg) => write!(f, "background task failed: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for AgentError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = AgentError::Config("block_size must be positive".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn test_transport_error_has_source() {
        let err: AgentError = TransportError::Closed.into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
