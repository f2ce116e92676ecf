//! Error types for the deploy action

use std::fmt;

use thiserror::Error;

/// Body fragment the Deploy server returns when a task is polled while it is
/// still tearing down its step tree.
pub const TRANSIENT_TASK_FAULT: &str = "cannot create children while terminating or terminated";

/// HTTP status attached to a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Code(u16),
    NoResponse,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Code(code) => write!(f, "{}", code),
            RequestStatus::NoResponse => f.write_str("No response"),
        }
    }
}

/// Main error type for the deploy action
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Request failed with status code {status}: {body}")]
    RequestFailed {
        status: RequestStatus,
        body: serde_json::Value,
    },

    #[error("Environment {0} does not exist")]
    EnvironmentNotFound(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("deployit-manifest.xml not found in {0}")]
    ManifestNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("A DAR package already exists at {0}")]
    PackageExists(String),

    #[error("Deployment task {task_id} finished in state {state}")]
    DeploymentFailed { task_id: String, state: String },

    #[error(
        "Deployment task {task_id} failed; rollback task {rollback_task_id} restored the previous version"
    )]
    DeploymentFailedRollbackSucceeded {
        task_id: String,
        rollback_task_id: String,
    },

    #[error(
        "Deployment task {task_id} failed and rollback task {rollback_task_id} finished in state {state}"
    )]
    RollbackFailed {
        task_id: String,
        rollback_task_id: String,
        state: String,
    },

    #[error("Task {task_id} did not finish before the deadline")]
    DeadlineExceeded { task_id: String },

    #[error("Deploy server is not running (state: {0})")]
    ServerNotRunning(String),

    #[error("Invalid workflow transition: {0}")]
    InvalidTransition(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Whether this is the server-side fault that task polling may retry
    pub fn is_transient_task_error(&self) -> bool {
        match self {
            ActionError::RequestFailed {
                status: RequestStatus::Code(500),
                body,
            } => body.to_string().contains(TRANSIENT_TASK_FAULT),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for ActionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ActionError::Internal(err.to_string())
    }
}
