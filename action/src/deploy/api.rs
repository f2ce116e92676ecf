//! Remote operations the deployment workflow depends on

use async_trait::async_trait;
use deployit_models::models::DeploymentObject;

use crate::deploy::ids::EnvironmentId;
use crate::deploy::task::TaskState;
use crate::errors::ActionError;

/// Deploy server operations used by [`crate::deploy::workflow::DeploymentWorkflow`]
#[async_trait]
pub trait DeployApi: Send + Sync {
    async fn environment_exists(&self, environment: &EnvironmentId) -> Result<bool, ActionError>;

    async fn deployment_exists(
        &self,
        application: &str,
        environment: &EnvironmentId,
    ) -> Result<bool, ActionError>;

    async fn prepare_initial(
        &self,
        version: &str,
        environment: &EnvironmentId,
    ) -> Result<DeploymentObject, ActionError>;

    async fn prepare_update(
        &self,
        version: &str,
        deployed_application: &str,
    ) -> Result<DeploymentObject, ActionError>;

    async fn prepare_deployeds(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError>;

    async fn validate_deployment(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError>;

    /// Returns the id of the new deployment task
    async fn create_deployment_task(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<String, ActionError>;

    async fn start_task(&self, task_id: &str) -> Result<(), ActionError>;

    async fn task_state(&self, task_id: &str) -> Result<TaskState, ActionError>;

    async fn archive_task(&self, task_id: &str) -> Result<(), ActionError>;

    /// Returns the id of the rollback task
    async fn create_rollback_task(&self, task_id: &str) -> Result<String, ActionError>;
}
