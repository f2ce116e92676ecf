//! Remote task states

use std::fmt;
use std::str::FromStr;

/// State of a task on the Deploy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Executing,
    Aborting,
    Stopping,
    Failing,
    Pending,
    Executed,
    Done,
    Failed,
    /// Any state this client does not know; treated as a failed terminal
    Other(String),
}

/// How a task state should be acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn outcome(&self) -> TaskOutcome {
        match self {
            TaskState::Queued
            | TaskState::Executing
            | TaskState::Aborting
            | TaskState::Stopping
            | TaskState::Failing
            | TaskState::Pending => TaskOutcome::Running,
            TaskState::Executed | TaskState::Done => TaskOutcome::Succeeded,
            TaskState::Failed | TaskState::Other(_) => TaskOutcome::Failed,
        }
    }

    pub fn is_running(&self) -> bool {
        self.outcome() == TaskOutcome::Running
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == TaskOutcome::Succeeded
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Queued => "QUEUED",
            TaskState::Executing => "EXECUTING",
            TaskState::Aborting => "ABORTING",
            TaskState::Stopping => "STOPPING",
            TaskState::Failing => "FAILING",
            TaskState::Pending => "PENDING",
            TaskState::Executed => "EXECUTED",
            TaskState::Done => "DONE",
            TaskState::Failed => "FAILED",
            TaskState::Other(state) => state,
        }
    }
}

impl FromStr for TaskState {
    type Err = std::convert::Infallible;

    /// Matches the server spelling exactly; anything else is kept verbatim
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "QUEUED" => TaskState::Queued,
            "EXECUTING" => TaskState::Executing,
            "ABORTING" => TaskState::Aborting,
            "STOPPING" => TaskState::Stopping,
            "FAILING" => TaskState::Failing,
            "PENDING" => TaskState::Pending,
            "EXECUTED" => TaskState::Executed,
            "DONE" => TaskState::Done,
            "FAILED" => TaskState::Failed,
            other => TaskState::Other(other.to_string()),
        };
        Ok(state)
    }
}

impl From<&str> for TaskState {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
