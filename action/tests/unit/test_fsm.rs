//! FSM unit tests

use deployit_action::deploy::fsm::{WorkflowEvent, WorkflowFsm, WorkflowStage};
use deployit_action::deploy::task::TaskState;

fn running_fsm() -> WorkflowFsm {
    let mut fsm = WorkflowFsm::new();
    fsm.process(WorkflowEvent::EnvironmentVerified).unwrap();
    fsm.process(WorkflowEvent::DeploymentPrepared).unwrap();
    fsm.process(WorkflowEvent::DeploymentValidated).unwrap();
    fsm.process(WorkflowEvent::TaskCreated("task-1".to_string()))
        .unwrap();
    fsm.process(WorkflowEvent::TaskStarted).unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = WorkflowFsm::new();
    assert_eq!(fsm.stage(), WorkflowStage::Idle);
    assert!(fsm.error().is_none());
    assert!(fsm.task_id().is_none());
}

#[test]
fn test_fsm_rollback_success_flow() {
    let mut fsm = running_fsm();
    assert_eq!(fsm.stage(), WorkflowStage::TaskRunning);

    fsm.process(WorkflowEvent::TaskFinished(TaskState::Failed))
        .unwrap();
    assert_eq!(fsm.stage(), WorkflowStage::TaskFailed);

    fsm.process(WorkflowEvent::RollbackCreated("rollback-1".to_string()))
        .unwrap();
    fsm.process(WorkflowEvent::TaskStarted).unwrap();
    assert_eq!(fsm.stage(), WorkflowStage::RollbackRunning);

    fsm.process(WorkflowEvent::TaskFinished(TaskState::Executed))
        .unwrap();
    assert_eq!(fsm.stage(), WorkflowStage::RollbackSucceeded);

    fsm.process(WorkflowEvent::TaskArchived).unwrap();
    assert_eq!(fsm.stage(), WorkflowStage::Done);
    assert_eq!(fsm.task_id(), Some("task-1"));
    assert_eq!(fsm.rollback_task_id(), Some("rollback-1"));
}

#[test]
fn test_fsm_rollback_failure_is_final() {
    let mut fsm = running_fsm();
    fsm.process(WorkflowEvent::TaskFinished(TaskState::from("CANCELLED")))
        .unwrap();
    fsm.process(WorkflowEvent::RollbackCreated("rollback-1".to_string()))
        .unwrap();
    fsm.process(WorkflowEvent::TaskStarted).unwrap();
    fsm.process(WorkflowEvent::TaskFinished(TaskState::Failed))
        .unwrap();

    assert_eq!(fsm.stage(), WorkflowStage::RollbackFailed);
    assert!(fsm.stage().is_final());
    assert!(fsm.process(WorkflowEvent::TaskArchived).is_err());
    assert!(fsm.process(WorkflowEvent::Abort("late".to_string())).is_err());
}

#[test]
fn test_fsm_failure_without_rollback_is_final() {
    let mut fsm = running_fsm();
    fsm.process(WorkflowEvent::TaskFinished(TaskState::Failed))
        .unwrap();
    fsm.process(WorkflowEvent::RollbackSkipped).unwrap();

    assert_eq!(fsm.stage(), WorkflowStage::Failed);
    assert!(fsm.stage().is_final());
    assert!(fsm.error().is_none());
    assert!(fsm.process(WorkflowEvent::Abort("late".to_string())).is_err());
    assert!(fsm
        .process(WorkflowEvent::RollbackCreated("rollback-1".to_string()))
        .is_err());
}

#[test]
fn test_fsm_abort() {
    let mut fsm = WorkflowFsm::new();
    fsm.process(WorkflowEvent::EnvironmentVerified).unwrap();
    fsm.process(WorkflowEvent::Abort("validation rejected".to_string()))
        .unwrap();

    assert_eq!(fsm.stage(), WorkflowStage::Aborted);
    assert_eq!(fsm.error(), Some("validation rejected"));
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = WorkflowFsm::new();

    // Cannot start a task before one is created
    assert!(fsm.process(WorkflowEvent::TaskStarted).is_err());

    // Cannot roll back a successful task
    let mut fsm = running_fsm();
    fsm.process(WorkflowEvent::TaskFinished(TaskState::Done))
        .unwrap();
    assert!(fsm
        .process(WorkflowEvent::RollbackCreated("rollback-1".to_string()))
        .is_err());
    assert_eq!(fsm.stage(), WorkflowStage::TaskSucceeded);
}
