//! Deployment workflow: prepare, run and, on failure, roll back a deployment task

use std::time::Duration;

use deployit_models::models::DeploymentObject;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::app::outputs::{Reporter, Summary, DEPLOYMENT_TASK_ID, ROLLBACK_TASK_ID};
use crate::deploy::api::DeployApi;
use crate::deploy::fsm::{WorkflowEvent, WorkflowFsm};
use crate::deploy::ids::{DeploymentPackageId, EnvironmentId};
use crate::deploy::task::TaskState;
use crate::errors::ActionError;

/// Shortest delay allowed between two task polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Workflow timing settings
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Delay between two polls of a running task
    pub poll_interval: Duration,

    /// Retries allowed for the transient task fault before it is raised
    pub transient_retry_limit: u32,

    /// Backoff unit; retry `n` waits `n * transient_backoff_step`
    pub transient_backoff_step: Duration,

    /// Upper bound for the whole deployment, unbounded when `None`
    pub deadline: Option<Duration>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            poll_interval: MIN_POLL_INTERVAL,
            transient_retry_limit: 5,
            transient_backoff_step: Duration::from_secs(5),
            deadline: None,
        }
    }
}

/// Drives one deployment through its remote task lifecycle
pub struct DeploymentWorkflow<'a, A: DeployApi + ?Sized> {
    api: &'a A,
    reporter: &'a dyn Reporter,
    settings: WorkflowSettings,
}

impl<'a, A: DeployApi + ?Sized> DeploymentWorkflow<'a, A> {
    pub fn new(api: &'a A, reporter: &'a dyn Reporter, settings: WorkflowSettings) -> Self {
        Self {
            api,
            reporter,
            settings,
        }
    }

    /// Deploy a package to an environment.
    ///
    /// Returns once the deployment task is executed and archived. A failed
    /// task is reported as an error even when its rollback succeeds.
    pub async fn deploy(
        &self,
        package: &DeploymentPackageId,
        target_environment: &str,
        rollback_enabled: bool,
    ) -> Result<(), ActionError> {
        let mut fsm = WorkflowFsm::new();
        let deadline = self.settings.deadline.map(|d| Instant::now() + d);

        let result = self
            .run(&mut fsm, package, target_environment, rollback_enabled, deadline)
            .await;

        if let Err(e) = &result {
            if !fsm.stage().is_final() {
                if let Err(transition) = fsm.process(WorkflowEvent::Abort(e.to_string())) {
                    warn!("Unable to abort deployment workflow: {}", transition);
                }
            }
        }
        debug!("Deployment of {} ended in {:?}", package, fsm.stage());
        result
    }

    async fn run(
        &self,
        fsm: &mut WorkflowFsm,
        package: &DeploymentPackageId,
        target_environment: &str,
        rollback_enabled: bool,
        deadline: Option<Instant>,
    ) -> Result<(), ActionError> {
        let environment = EnvironmentId::normalize(target_environment);
        info!("Deploying {} to {}", package, environment);

        if !self.api.environment_exists(&environment).await? {
            error!("Environment {} does not exist", environment);
            return Err(ActionError::EnvironmentNotFound(environment.to_string()));
        }
        advance(fsm, WorkflowEvent::EnvironmentVerified)?;

        let deployment = self.create_deployment(package, &environment).await?;
        let deployment = self.api.prepare_deployeds(&deployment).await?;
        advance(fsm, WorkflowEvent::DeploymentPrepared)?;

        let deployment = self.api.validate_deployment(&deployment).await?;
        advance(fsm, WorkflowEvent::DeploymentValidated)?;

        let task_id = self.api.create_deployment_task(&deployment).await?;
        advance(fsm, WorkflowEvent::TaskCreated(task_id.clone()))?;
        info!("Deployment task {} created", task_id);
        self.reporter.set_output(DEPLOYMENT_TASK_ID, &task_id).await;

        self.api.start_task(&task_id).await?;
        advance(fsm, WorkflowEvent::TaskStarted)?;

        let state = self.poll_task(&task_id, deadline).await?;
        advance(fsm, WorkflowEvent::TaskFinished(state.clone()))?;

        if state.is_success() {
            self.api.archive_task(&task_id).await?;
            advance(fsm, WorkflowEvent::TaskArchived)?;
            info!("Deployment of {} to {} succeeded", package, environment);
            self.report(package, &environment, &task_id, &state, None).await;
            return Ok(());
        }

        warn!("Deployment task {} finished in state {}", task_id, state);
        if !rollback_enabled {
            advance(fsm, WorkflowEvent::RollbackSkipped)?;
            self.report(package, &environment, &task_id, &state, None).await;
            return Err(ActionError::DeploymentFailed {
                task_id,
                state: state.to_string(),
            });
        }

        let rollback_task_id = self.api.create_rollback_task(&task_id).await?;
        advance(fsm, WorkflowEvent::RollbackCreated(rollback_task_id.clone()))?;
        info!("Rollback task {} created for {}", rollback_task_id, task_id);
        self.reporter.set_output(ROLLBACK_TASK_ID, &rollback_task_id).await;

        self.api.start_task(&rollback_task_id).await?;
        advance(fsm, WorkflowEvent::TaskStarted)?;

        let rollback_state = self.poll_task(&rollback_task_id, deadline).await?;
        advance(fsm, WorkflowEvent::TaskFinished(rollback_state.clone()))?;
        self.report(
            package,
            &environment,
            &task_id,
            &state,
            Some((rollback_task_id.as_str(), &rollback_state)),
        )
        .await;

        if rollback_state.is_success() {
            self.api.archive_task(&rollback_task_id).await?;
            advance(fsm, WorkflowEvent::TaskArchived)?;
            info!("Rollback task {} succeeded", rollback_task_id);
            Err(ActionError::DeploymentFailedRollbackSucceeded {
                task_id,
                rollback_task_id,
            })
        } else {
            error!(
                "Rollback task {} finished in state {}",
                rollback_task_id, rollback_state
            );
            Err(ActionError::RollbackFailed {
                task_id,
                rollback_task_id,
                state: rollback_state.to_string(),
            })
        }
    }

    /// Fetch an update deployment object when the application is already in
    /// the environment, an initial one otherwise
    pub async fn create_deployment(
        &self,
        package: &DeploymentPackageId,
        environment: &EnvironmentId,
    ) -> Result<DeploymentObject, ActionError> {
        let application = package.application_full_name();

        if self.api.deployment_exists(&application, environment).await? {
            let deployed_application = format!("{}/{}", environment, package.application_name());
            info!("Preparing update deployment of {}", deployed_application);
            self.api
                .prepare_update(package.as_str(), &deployed_application)
                .await
        } else {
            info!("Preparing initial deployment of {} to {}", application, environment);
            self.api.prepare_initial(package.as_str(), environment).await
        }
    }

    /// Poll a task until it leaves the running states
    pub async fn wait_for_task(&self, task_id: &str) -> Result<TaskState, ActionError> {
        let deadline = self.settings.deadline.map(|d| Instant::now() + d);
        self.poll_task(task_id, deadline).await
    }

    async fn poll_task(
        &self,
        task_id: &str,
        deadline: Option<Instant>,
    ) -> Result<TaskState, ActionError> {
        let mut transient_failures: u32 = 0;
        let mut last_state: Option<TaskState> = None;

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ActionError::DeadlineExceeded {
                    task_id: task_id.to_string(),
                });
            }

            match self.api.task_state(task_id).await {
                Ok(state) => {
                    transient_failures = 0;
                    if state.is_terminal() {
                        info!("Task {} finished in state {}", task_id, state);
                        return Ok(state);
                    }
                    if last_state.as_ref() != Some(&state) {
                        info!("Task {} is {}", task_id, state);
                        last_state = Some(state);
                    }
                    sleep(self.settings.poll_interval).await;
                }
                Err(e)
                    if e.is_transient_task_error()
                        && transient_failures < self.settings.transient_retry_limit =>
                {
                    transient_failures += 1;
                    let backoff = self.settings.transient_backoff_step * transient_failures;
                    warn!(
                        "Polling task {} hit a transient server fault (attempt {}/{}), retrying in {:?}",
                        task_id, transient_failures, self.settings.transient_retry_limit, backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn report(
        &self,
        package: &DeploymentPackageId,
        environment: &EnvironmentId,
        task_id: &str,
        state: &TaskState,
        rollback: Option<(&str, &TaskState)>,
    ) {
        let mut summary = Summary::new("Deployment")
            .row("Package", package.as_str())
            .row("Environment", environment.as_str())
            .row("Deployment task", task_id)
            .row("Deployment state", state.as_str());
        if let Some((rollback_task_id, rollback_state)) = rollback {
            summary = summary
                .row("Rollback task", rollback_task_id)
                .row("Rollback state", rollback_state.as_str());
        }
        self.reporter.summary(summary).await;
    }
}

fn advance(fsm: &mut WorkflowFsm, event: WorkflowEvent) -> Result<(), ActionError> {
    let stage = fsm.process(event).map_err(ActionError::InvalidTransition)?;
    debug!("Workflow stage: {:?}", stage);
    Ok(())
}
