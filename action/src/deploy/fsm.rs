//! Finite State Machine for a deployment run

use serde::{Deserialize, Serialize};

use crate::deploy::task::TaskState;

/// Deployment workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Nothing has been sent to the server yet
    Idle,

    /// Target environment exists
    EnvironmentVerified,

    /// Initial or update deployment object obtained and deployeds prepared
    DeploymentPrepared,

    /// Server accepted the deployment object
    DeploymentValidated,

    /// Deployment task created
    TaskCreated,

    /// Deployment task started and being polled
    TaskRunning,

    /// Deployment task reached a success state
    TaskSucceeded,

    /// Deployment task reached any other terminal state
    TaskFailed,

    /// Deployment task failed and rollback is disabled
    Failed,

    /// Rollback task created
    RollbackCreated,

    /// Rollback task started and being polled
    RollbackRunning,

    /// Rollback task reached a success state
    RollbackSucceeded,

    /// Rollback task reached any other terminal state
    RollbackFailed,

    /// Finished task archived
    Done,

    /// Run stopped on an error before reaching a terminal stage
    Aborted,
}

impl WorkflowStage {
    /// Whether no further event is accepted
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            WorkflowStage::Done
                | WorkflowStage::Failed
                | WorkflowStage::Aborted
                | WorkflowStage::RollbackFailed
        )
    }
}

/// Workflow event
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    EnvironmentVerified,
    DeploymentPrepared,
    DeploymentValidated,
    TaskCreated(String),
    TaskStarted,
    TaskFinished(TaskState),
    TaskArchived,
    RollbackSkipped,
    RollbackCreated(String),
    Abort(String),
}

/// Deployment workflow FSM
#[derive(Debug, Clone)]
pub struct WorkflowFsm {
    stage: WorkflowStage,
    task_id: Option<String>,
    rollback_task_id: Option<String>,
    error: Option<String>,
}

impl WorkflowFsm {
    /// Create a new FSM in the idle stage
    pub fn new() -> Self {
        Self {
            stage: WorkflowStage::Idle,
            task_id: None,
            rollback_task_id: None,
            error: None,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn rollback_task_id(&self) -> Option<&str> {
        self.rollback_task_id.as_deref()
    }

    /// Error message of an aborted run
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition stage
    pub fn process(&mut self, event: WorkflowEvent) -> Result<WorkflowStage, String> {
        use WorkflowEvent as E;
        use WorkflowStage as S;

        let new_stage = match (self.stage, &event) {
            (S::Idle, E::EnvironmentVerified) => S::EnvironmentVerified,
            (S::EnvironmentVerified, E::DeploymentPrepared) => S::DeploymentPrepared,
            (S::DeploymentPrepared, E::DeploymentValidated) => S::DeploymentValidated,
            (S::DeploymentValidated, E::TaskCreated(task_id)) => {
                self.task_id = Some(task_id.clone());
                S::TaskCreated
            }
            (S::TaskCreated, E::TaskStarted) => S::TaskRunning,
            (S::TaskRunning, E::TaskFinished(state)) if state.is_terminal() => {
                if state.is_success() {
                    S::TaskSucceeded
                } else {
                    S::TaskFailed
                }
            }
            (S::TaskSucceeded, E::TaskArchived) => S::Done,

            (S::TaskFailed, E::RollbackSkipped) => S::Failed,
            (S::TaskFailed, E::RollbackCreated(task_id)) => {
                self.rollback_task_id = Some(task_id.clone());
                S::RollbackCreated
            }
            (S::RollbackCreated, E::TaskStarted) => S::RollbackRunning,
            (S::RollbackRunning, E::TaskFinished(state)) if state.is_terminal() => {
                if state.is_success() {
                    S::RollbackSucceeded
                } else {
                    S::RollbackFailed
                }
            }
            (S::RollbackSucceeded, E::TaskArchived) => S::Done,

            (stage, E::Abort(err)) if !stage.is_final() => {
                self.error = Some(err.clone());
                S::Aborted
            }

            // Invalid transitions
            (stage, event) => {
                return Err(format!("{:?} -> {:?}", stage, event));
            }
        };

        self.stage = new_stage;
        Ok(new_stage)
    }
}

impl Default for WorkflowFsm {
    fn default() -> Self {
        Self::new()
    }
}
