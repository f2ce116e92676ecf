//! Deployment workflow tests against a scripted server

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use deployit_action::app::outputs::{DEPLOYMENT_TASK_ID, ROLLBACK_TASK_ID};
use deployit_action::deploy::api::DeployApi;
use deployit_action::deploy::ids::{DeploymentPackageId, EnvironmentId};
use deployit_action::deploy::task::TaskState;
use deployit_action::deploy::workflow::{DeploymentWorkflow, WorkflowSettings};
use deployit_action::errors::{ActionError, RequestStatus, TRANSIENT_TASK_FAULT};
use deployit_models::models::DeploymentObject;
use serde_json::json;
use tokio::time::Instant;

use crate::reporter::MemoryReporter;

/// One scripted answer to a task poll
#[derive(Debug, Clone)]
enum Poll {
    State(&'static str),
    Transient,
    Fatal,
}

struct ScriptedApi {
    environment_exists: bool,
    deployment_exists: bool,
    reject_validation: bool,
    polls: Mutex<HashMap<String, VecDeque<Poll>>>,
    poll_times: Mutex<Vec<Instant>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self {
            environment_exists: true,
            deployment_exists: false,
            reject_validation: false,
            polls: Mutex::new(HashMap::new()),
            poll_times: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_polls(self, task_id: &str, polls: Vec<Poll>) -> Self {
        self.polls
            .lock()
            .unwrap()
            .insert(task_id.to_string(), polls.into());
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn poll_count(&self, task_id: &str) -> usize {
        let call = format!("poll {}", task_id);
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn poll_intervals(&self) -> Vec<Duration> {
        let times = self.poll_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

fn stage_of(deployment: &DeploymentObject) -> String {
    deployment.as_value()["stage"]
        .as_str()
        .unwrap_or("?")
        .to_string()
}

#[async_trait]
impl DeployApi for ScriptedApi {
    async fn environment_exists(&self, environment: &EnvironmentId) -> Result<bool, ActionError> {
        self.record(format!("environment_exists {}", environment));
        Ok(self.environment_exists)
    }

    async fn deployment_exists(
        &self,
        application: &str,
        environment: &EnvironmentId,
    ) -> Result<bool, ActionError> {
        self.record(format!("deployment_exists {} {}", application, environment));
        Ok(self.deployment_exists)
    }

    async fn prepare_initial(
        &self,
        version: &str,
        environment: &EnvironmentId,
    ) -> Result<DeploymentObject, ActionError> {
        self.record(format!("prepare_initial {} {}", version, environment));
        Ok(json!({"stage": "initial"}).into())
    }

    async fn prepare_update(
        &self,
        version: &str,
        deployed_application: &str,
    ) -> Result<DeploymentObject, ActionError> {
        self.record(format!("prepare_update {} {}", version, deployed_application));
        Ok(json!({"stage": "update"}).into())
    }

    async fn prepare_deployeds(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError> {
        self.record(format!("prepare_deployeds {}", stage_of(deployment)));
        Ok(json!({"stage": "prepared"}).into())
    }

    async fn validate_deployment(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError> {
        self.record(format!("validate {}", stage_of(deployment)));
        if self.reject_validation {
            return Err(ActionError::RequestFailed {
                status: RequestStatus::Code(400),
                body: json!({"validation-messages": ["no deployeds"]}),
            });
        }
        Ok(json!({"stage": "validated"}).into())
    }

    async fn create_deployment_task(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<String, ActionError> {
        self.record(format!("create_task {}", stage_of(deployment)));
        Ok("task-1".to_string())
    }

    async fn start_task(&self, task_id: &str) -> Result<(), ActionError> {
        self.record(format!("start {}", task_id));
        Ok(())
    }

    async fn task_state(&self, task_id: &str) -> Result<TaskState, ActionError> {
        self.record(format!("poll {}", task_id));
        self.poll_times.lock().unwrap().push(Instant::now());

        let next = self
            .polls
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(|polls| polls.pop_front());

        match next {
            Some(Poll::State(state)) => Ok(TaskState::from(state)),
            Some(Poll::Transient) => Err(ActionError::RequestFailed {
                status: RequestStatus::Code(500),
                body: json!(format!("Internal error: {}", TRANSIENT_TASK_FAULT)),
            }),
            Some(Poll::Fatal) => Err(ActionError::RequestFailed {
                status: RequestStatus::Code(500),
                body: json!("java.lang.NullPointerException"),
            }),
            None => Ok(TaskState::Executing),
        }
    }

    async fn archive_task(&self, task_id: &str) -> Result<(), ActionError> {
        self.record(format!("archive {}", task_id));
        Ok(())
    }

    async fn create_rollback_task(&self, task_id: &str) -> Result<String, ActionError> {
        self.record(format!("rollback {}", task_id));
        Ok("rollback-1".to_string())
    }
}

fn package() -> DeploymentPackageId {
    DeploymentPackageId::parse("Applications/PetClinic/1.0").unwrap()
}

async fn deploy(api: &ScriptedApi, reporter: &MemoryReporter, rollback: bool) -> Result<(), ActionError> {
    DeploymentWorkflow::new(api, reporter, WorkflowSettings::default())
        .deploy(&package(), "Dev", rollback)
        .await
}

// =============================== SCENARIOS ================================== //

#[tokio::test(start_paused = true)]
async fn test_missing_environment_stops_before_any_task() {
    let mut api = ScriptedApi::new();
    api.environment_exists = false;
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, true).await;

    match result {
        Err(ActionError::EnvironmentNotFound(env)) => assert_eq!(env, "Environments/Dev"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(api.calls(), vec!["environment_exists Environments/Dev"]);
    assert!(reporter.outputs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_successful_deployment_is_archived_without_rollback() {
    let api = ScriptedApi::new().with_polls(
        "task-1",
        vec![Poll::State("QUEUED"), Poll::State("EXECUTING"), Poll::State("DONE")],
    );
    let reporter = MemoryReporter::new();

    deploy(&api, &reporter, true).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            "environment_exists Environments/Dev",
            "deployment_exists Applications/PetClinic Environments/Dev",
            "prepare_initial Applications/PetClinic/1.0 Environments/Dev",
            "prepare_deployeds initial",
            "validate prepared",
            "create_task validated",
            "start task-1",
            "poll task-1",
            "poll task-1",
            "poll task-1",
            "archive task-1",
        ]
    );
    assert_eq!(reporter.output(DEPLOYMENT_TASK_ID).as_deref(), Some("task-1"));
    assert!(reporter.output(ROLLBACK_TASK_ID).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_deployment_without_rollback() {
    let api = ScriptedApi::new().with_polls("task-1", vec![Poll::State("FAILED")]);
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, false).await;

    match result {
        Err(ActionError::DeploymentFailed { task_id, state }) => {
            assert_eq!(task_id, "task-1");
            assert_eq!(state, "FAILED");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!api.called("rollback"));
    assert!(!api.called("archive"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_deployment_with_successful_rollback() {
    let api = ScriptedApi::new()
        .with_polls("task-1", vec![Poll::State("EXECUTING"), Poll::State("FAILED")])
        .with_polls("rollback-1", vec![Poll::State("EXECUTING"), Poll::State("EXECUTED")]);
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, true).await;

    match result {
        Err(ActionError::DeploymentFailedRollbackSucceeded {
            task_id,
            rollback_task_id,
        }) => {
            assert_eq!(task_id, "task-1");
            assert_eq!(rollback_task_id, "rollback-1");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let calls = api.calls();
    let tail: Vec<&str> = calls[calls.len() - 5..].iter().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "rollback task-1",
            "start rollback-1",
            "poll rollback-1",
            "poll rollback-1",
            "archive rollback-1",
        ]
    );
    assert!(!api.called("archive task-1"));
    assert_eq!(reporter.output(ROLLBACK_TASK_ID).as_deref(), Some("rollback-1"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_rollback() {
    let api = ScriptedApi::new()
        .with_polls("task-1", vec![Poll::State("FAILED")])
        .with_polls("rollback-1", vec![Poll::State("FAILED")]);
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, true).await;

    match result {
        Err(ActionError::RollbackFailed {
            task_id,
            rollback_task_id,
            state,
        }) => {
            assert_eq!(task_id, "task-1");
            assert_eq!(rollback_task_id, "rollback-1");
            assert_eq!(state, "FAILED");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!api.called("archive"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_terminal_state_triggers_rollback() {
    let api = ScriptedApi::new()
        .with_polls("task-1", vec![Poll::State("CANCELLED")])
        .with_polls("rollback-1", vec![Poll::State("DONE")]);
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, true).await;

    assert!(matches!(
        result,
        Err(ActionError::DeploymentFailedRollbackSucceeded { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_existing_deployment_is_updated() {
    let mut api = ScriptedApi::new().with_polls("task-1", vec![Poll::State("EXECUTED")]);
    api.deployment_exists = true;
    let reporter = MemoryReporter::new();

    DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default())
        .deploy(&package(), "environments/Dev", false)
        .await
        .unwrap();

    let calls = api.calls();
    assert_eq!(calls[0], "environment_exists environments/Dev");
    assert_eq!(
        calls[2],
        "prepare_update Applications/PetClinic/1.0 environments/Dev/PetClinic"
    );
    assert_eq!(calls[3], "prepare_deployeds update");
}

#[tokio::test(start_paused = true)]
async fn test_validation_rejection_propagates() {
    let mut api = ScriptedApi::new();
    api.reject_validation = true;
    let reporter = MemoryReporter::new();

    let result = deploy(&api, &reporter, true).await;

    match result {
        Err(ActionError::RequestFailed { status, .. }) => {
            assert_eq!(status, RequestStatus::Code(400))
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!api.called("create_task"));
}

// =============================== POLLING ================================== //

#[tokio::test(start_paused = true)]
async fn test_wait_for_task_polls_every_five_seconds() {
    let api = ScriptedApi::new().with_polls(
        "task-1",
        vec![
            Poll::State("PENDING"),
            Poll::State("EXECUTING"),
            Poll::State("STOPPING"),
            Poll::State("EXECUTED"),
            Poll::State("FAILED"),
        ],
    );
    let reporter = MemoryReporter::new();
    let workflow = DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default());

    let state = workflow.wait_for_task("task-1").await.unwrap();

    assert_eq!(state, TaskState::Executed);
    assert_eq!(api.poll_count("task-1"), 4);
    for interval in api.poll_intervals() {
        assert!(interval >= Duration::from_secs(5), "{:?}", interval);
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_faults_within_budget_are_absorbed() {
    let api = ScriptedApi::new().with_polls(
        "task-1",
        vec![
            Poll::Transient,
            Poll::Transient,
            Poll::Transient,
            Poll::Transient,
            Poll::State("DONE"),
        ],
    );
    let reporter = MemoryReporter::new();
    let workflow = DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default());

    let started = Instant::now();
    let state = workflow.wait_for_task("task-1").await.unwrap();

    assert_eq!(state, TaskState::Done);
    assert_eq!(api.poll_count("task-1"), 5);
    // linear backoff: 5 + 10 + 15 + 20 seconds
    assert!(started.elapsed() >= Duration::from_secs(50));
}

#[tokio::test(start_paused = true)]
async fn test_transient_faults_beyond_budget_are_raised() {
    let api = ScriptedApi::new().with_polls("task-1", vec![Poll::Transient; 6]);
    let reporter = MemoryReporter::new();
    let workflow = DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default());

    let err = workflow.wait_for_task("task-1").await.unwrap_err();

    assert!(err.is_transient_task_error());
    assert_eq!(api.poll_count("task-1"), 6);
}

#[tokio::test(start_paused = true)]
async fn test_successful_poll_resets_transient_budget() {
    let mut polls = vec![Poll::Transient; 5];
    polls.push(Poll::State("EXECUTING"));
    polls.extend(vec![Poll::Transient; 5]);
    polls.push(Poll::State("DONE"));
    let api = ScriptedApi::new().with_polls("task-1", polls);
    let reporter = MemoryReporter::new();
    let workflow = DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default());

    assert_eq!(workflow.wait_for_task("task-1").await.unwrap(), TaskState::Done);
    assert_eq!(api.poll_count("task-1"), 12);
}

#[tokio::test(start_paused = true)]
async fn test_other_poll_errors_are_not_retried() {
    let api = ScriptedApi::new().with_polls("task-1", vec![Poll::Fatal, Poll::State("DONE")]);
    let reporter = MemoryReporter::new();
    let workflow = DeploymentWorkflow::new(&api, &reporter, WorkflowSettings::default());

    let err = workflow.wait_for_task("task-1").await.unwrap_err();

    assert!(!err.is_transient_task_error());
    assert_eq!(api.poll_count("task-1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_polling() {
    // No scripted polls: the task stays EXECUTING
    let api = ScriptedApi::new();
    let reporter = MemoryReporter::new();
    let settings = WorkflowSettings {
        deadline: Some(Duration::from_secs(12)),
        ..Default::default()
    };
    let workflow = DeploymentWorkflow::new(&api, &reporter, settings);

    match workflow.wait_for_task("task-1").await {
        Err(ActionError::DeadlineExceeded { task_id }) => assert_eq!(task_id, "task-1"),
        other => panic!("unexpected result: {:?}", other),
    }
    // polls at 0s, 5s and 10s
    assert_eq!(api.poll_count("task-1"), 3);
}
