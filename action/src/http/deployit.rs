//! Deploy server REST endpoints

use async_trait::async_trait;
use deployit_models::models::{
    BooleanResponse, DeploymentObject, ServerStateResponse, StringResponse, TaskResponse,
    UploadResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tracing::{info, warn};
use urlencoding::encode;

use crate::app::outputs::{Reporter, Summary};
use crate::deploy::api::DeployApi;
use crate::deploy::ids::EnvironmentId;
use crate::deploy::task::TaskState;
use crate::errors::ActionError;
use crate::filesys::file::File;
use crate::http::client::DeployClient;
use crate::utils::sha256_hex;

/// Mode reported by a healthy server
pub const SERVER_RUNNING: &str = "RUNNING";
/// Sentinel for a server that could not be asked
pub const SERVER_UNREACHABLE: &str = "UNREACHABLE";

const SERVER_STATE: &str = "/deployit/server/state";
const DEPLOYMENT: &str = "/deployit/deployment";
const TASKS: &str = "/deployit/tasks/v2";

impl DeployClient {
    /// Current server mode, or `UNREACHABLE` on any failure
    pub async fn server_state(&self) -> String {
        match self.get::<ServerStateResponse>(SERVER_STATE).await {
            Ok(state) => state.current_mode,
            Err(e) => {
                warn!("Deploy server at {} is unreachable: {}", self.base_url(), e);
                SERVER_UNREACHABLE.to_string()
            }
        }
    }

    /// Upload a DAR archive, returning the package id assigned by the server
    pub async fn publish_package(
        &self,
        archive: &File,
        reporter: &dyn Reporter,
    ) -> Result<String, ActionError> {
        let bytes = archive.read_bytes().await?;
        let name = archive.name()?;
        let size = bytes.len();
        let checksum = sha256_hex(&bytes);
        info!("Publishing {} ({} bytes)", name, size);

        let part = Part::bytes(bytes)
            .file_name(name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| ActionError::Internal(e.to_string()))?;
        let form = Form::new().part("fileData", part);

        let endpoint = format!("/deployit/package/upload/{}", encode(&name));
        let request = self
            .builder(Method::POST, &endpoint)
            .timeout(self.upload_timeout())
            .multipart(form);
        let value = self.send(request, &Method::POST, &endpoint).await?;
        let response: UploadResponse = serde_json::from_value(value)?;

        info!("Package {} published successfully as {}", name, response.id);
        reporter
            .summary(
                Summary::new("Package published")
                    .row("Package", name)
                    .row("Size", format!("{} bytes", size))
                    .row("SHA-256", checksum)
                    .row("Package ID", response.id.clone())
                    .row("Server", self.base_url())
                    .row("Published at", chrono::Utc::now().to_rfc3339()),
            )
            .await;

        Ok(response.id)
    }
}

#[async_trait]
impl DeployApi for DeployClient {
    async fn environment_exists(&self, environment: &EnvironmentId) -> Result<bool, ActionError> {
        let endpoint = format!("/deployit/repository/exists/{}", environment);
        let response: BooleanResponse = self.get(&endpoint).await?;
        Ok(response.boolean)
    }

    async fn deployment_exists(
        &self,
        application: &str,
        environment: &EnvironmentId,
    ) -> Result<bool, ActionError> {
        let endpoint = format!(
            "{}/exists?application={}&environment={}",
            DEPLOYMENT,
            encode(application),
            encode(environment.as_str())
        );
        let response: BooleanResponse = self.get(&endpoint).await?;
        Ok(response.boolean)
    }

    async fn prepare_initial(
        &self,
        version: &str,
        environment: &EnvironmentId,
    ) -> Result<DeploymentObject, ActionError> {
        let endpoint = format!(
            "{}/prepare/initial?version={}&environment={}",
            DEPLOYMENT,
            encode(version),
            encode(environment.as_str())
        );
        self.get(&endpoint).await
    }

    async fn prepare_update(
        &self,
        version: &str,
        deployed_application: &str,
    ) -> Result<DeploymentObject, ActionError> {
        let endpoint = format!(
            "{}/prepare/update?version={}&deployedApplication={}",
            DEPLOYMENT,
            encode(version),
            encode(deployed_application)
        );
        self.get(&endpoint).await
    }

    async fn prepare_deployeds(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError> {
        self.post(&format!("{}/prepare/deployeds", DEPLOYMENT), deployment)
            .await
    }

    async fn validate_deployment(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<DeploymentObject, ActionError> {
        self.post(&format!("{}/validate", DEPLOYMENT), deployment)
            .await
    }

    async fn create_deployment_task(
        &self,
        deployment: &DeploymentObject,
    ) -> Result<String, ActionError> {
        let response: StringResponse = self.post(&format!("{}/", DEPLOYMENT), deployment).await?;
        Ok(response.string)
    }

    async fn start_task(&self, task_id: &str) -> Result<(), ActionError> {
        self.post_empty(&format!("{}/{}/start", TASKS, task_id))
            .await?;
        Ok(())
    }

    async fn task_state(&self, task_id: &str) -> Result<TaskState, ActionError> {
        let task: TaskResponse = self.get(&format!("{}/{}", TASKS, task_id)).await?;
        Ok(TaskState::from(task.state.as_str()))
    }

    async fn archive_task(&self, task_id: &str) -> Result<(), ActionError> {
        self.post_empty(&format!("{}/{}/archive", TASKS, task_id))
            .await?;
        Ok(())
    }

    async fn create_rollback_task(&self, task_id: &str) -> Result<String, ActionError> {
        let value = self
            .post_empty(&format!("{}/rollback/{}", DEPLOYMENT, task_id))
            .await?;
        let response: StringResponse = serde_json::from_value(value)?;
        Ok(response.string)
    }
}
