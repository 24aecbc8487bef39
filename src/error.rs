use std::io;
use thiserror::Error;

use crate::config::settings::ConfigError;
use crate::host::HostError;

/// Errors that can occur while running or reading git
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to spawn git in {cwd}: {source}")]
    SpawnFailed {
        cwd: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed git log line ({fields} fields): {line:?}")]
    MalformedLine { fields: usize, line: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Errors raised while resolving or running a named action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid action calling {action}: it can accept only {expected}")]
    SelectionCardinality {
        action: String,
        expected: &'static str,
    },

    #[error("invalid parameter '{param}' for {action}: expected {expected}")]
    ParameterType {
        action: String,
        param: &'static str,
        expected: &'static str,
    },

    #[error("git {command} exited with status {exit_code}")]
    SubprocessFailed { command: String, exit_code: i32 },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl ActionError {
    /// Validation failures leave the list and selection untouched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ActionError::UnknownAction(_)
                | ActionError::SelectionCardinality { .. }
                | ActionError::ParameterType { .. }
        )
    }
}

/// Top-level error for the binary and anything that mixes subsystems
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for git operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
