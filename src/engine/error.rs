//! Action error types
//!
//! Every failure surfaced to callers carries its category so a UI can pick
//! recovery text: connection problems, rejected input, failed remote
//! commands, unparseable output and timeouts are all distinct.

use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// Errors that can occur while building, running or parsing remote actions
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Command failed in step '{step}' (exit {exit_code}): {stderr}")]
    CommandFailed {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error category, stable across the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    InvalidInput,
    CommandFailed,
    Parse,
    Timeout,
    Config,
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Connection(_) => ErrorKind::Connection,
            ActionError::InvalidInput(_) => ErrorKind::InvalidInput,
            ActionError::CommandFailed { .. } => ErrorKind::CommandFailed,
            ActionError::Parse(_) => ErrorKind::Parse,
            ActionError::Timeout(_) => ErrorKind::Timeout,
            ActionError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ActionError::InvalidInput(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        ActionError::Parse(message.into())
    }

    /// Prefix the message with `context`, keeping the category
    pub fn with_context(self, context: &str) -> Self {
        match self {
            ActionError::Connection(m) => ActionError::Connection(format!("{}: {}", context, m)),
            ActionError::InvalidInput(m) => {
                ActionError::InvalidInput(format!("{}: {}", context, m))
            }
            ActionError::Parse(m) => ActionError::Parse(format!("{}: {}", context, m)),
            ActionError::Timeout(m) => ActionError::Timeout(format!("{}: {}", context, m)),
            ActionError::Config(m) => ActionError::Config(format!("{}: {}", context, m)),
            failed @ ActionError::CommandFailed { .. } => failed,
        }
    }
}

impl From<TransportError> for ActionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => ActionError::Timeout(err.to_string()),
            TransportError::Connection(_)
            | TransportError::Authentication(_)
            | TransportError::HostKeyMismatch { .. }
            | TransportError::Cancelled => ActionError::Connection(err.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::CommandFailed => "command_failed",
            ErrorKind::Parse => "parse",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}
