//! Framework error types

use thiserror::Error;

/// Which side of the current-agent binding contract was broken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingViolation {
    /// A scope tried to bind an agent while another was already bound
    AlreadyBound,
    /// Code asked for the current agent outside any bound scope
    NotBound,
}

impl std::fmt::Display for BindingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingViolation::AlreadyBound => write!(f, "current agent is already bound"),
            BindingViolation::NotBound => write!(f, "no current agent is bound"),
        }
    }
}

/// Errors that can occur in the agent runtime
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// A life task is already running for this agent
    #[error("Agent already alive: {0}")]
    AlreadyAlive(String),

    /// The agent was closed and cannot be started again
    #[error("Agent closed: {0}")]
    AgentClosed(String),

    /// An agent with the same (case-insensitive) name is registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// No agent with this name is registered
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Current-agent binding misuse
    #[error("Concurrency binding violation: {0}")]
    ConcurrencyBindingViolation(BindingViolation),

    /// Action lookup failed
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// Method lookup failed on a registered action
    #[error("Method not found: {action}.{method}")]
    MethodNotFound {
        /// Action the method was looked up on
        action: String,
        /// Requested method name
        method: String,
    },

    /// A bus was used after shutdown
    #[error("Bus closed: {0}")]
    BusClosed(&'static str),

    /// The runtime core is not running
    #[error("Runtime not running")]
    NotRunning,

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 payload could not be decoded
    #[error("Invalid file payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// Invalid configuration (e.g. a reserved agent name)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FrameworkError {
    /// Whether this error is a caller/programming error that must surface
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrameworkError::AlreadyAlive(_)
                | FrameworkError::AgentClosed(_)
                | FrameworkError::ConcurrencyBindingViolation(_)
        )
    }
}

/// Result type alias for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameworkError::AlreadyAlive("alice".into());
        assert_eq!(err.to_string(), "Agent already alive: alice");

        let err = FrameworkError::MethodNotFound {
            action: "Chat".into(),
            method: "shout".into(),
        };
        assert_eq!(err.to_string(), "Method not found: Chat.shout");

        let err = FrameworkError::ConcurrencyBindingViolation(BindingViolation::NotBound);
        assert_eq!(
            err.to_string(),
            "Concurrency binding violation: no current agent is bound"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(FrameworkError::AlreadyAlive("a".into()).is_fatal());
        assert!(
            FrameworkError::ConcurrencyBindingViolation(BindingViolation::AlreadyBound).is_fatal()
        );
        assert!(!FrameworkError::ActionNotFound("Ghost".into()).is_fatal());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FrameworkError = json_err.into();
        assert!(matches!(err, FrameworkError::Serialization(_)));
    }
}
