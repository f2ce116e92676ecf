//! Action dispatcher

use std::path::Path;

use tracing::info;

use crate::app::options::ActionOptions;
use crate::app::outputs::{Reporter, PACKAGE_ID, PACKAGE_PATH};
use crate::deploy::ids::DeploymentPackageId;
use crate::deploy::workflow::DeploymentWorkflow;
use crate::errors::ActionError;
use crate::filesys::file::File;
use crate::http::client::DeployClient;
use crate::http::deployit::SERVER_RUNNING;
use crate::package::archive::{self, PackageBuilder};
use crate::package::manifest;

/// Run the selected action against the configured server
pub async fn run(options: ActionOptions, reporter: &dyn Reporter) -> Result<(), ActionError> {
    info!("Running action '{}'", options.action);

    let client = DeployClient::new(options.server.clone(), &options.client)?;

    let state = client.server_state().await;
    if state != SERVER_RUNNING {
        return Err(ActionError::ServerNotRunning(state));
    }
    info!("Deploy server at {} is {}", client.base_url(), state);

    options.validate_for_action()?;

    let builder = PackageBuilder::from_current_dir()?;
    run_action(&options, &client, &builder, reporter).await
}

/// Create, publish and deploy as the action requires, publishing each
/// output as soon as it is known
pub async fn run_action(
    options: &ActionOptions,
    client: &DeployClient,
    builder: &PackageBuilder,
    reporter: &dyn Reporter,
) -> Result<(), ActionError> {
    let action = options.action;

    let archive_path = if action.creates() {
        let path = builder
            .create_package(
                required(options.manifest_path.as_deref(), "manifestPath")?,
                required(options.output_path.as_deref(), "outputPath")?,
                options.package_name.as_deref(),
                options.version_number.as_deref(),
            )
            .await?;
        reporter
            .set_output(PACKAGE_PATH, &path.display().to_string())
            .await;
        path
    } else {
        required(options.dar_package_path.as_deref(), "darPackagePath")?.to_path_buf()
    };

    let published_id = if action.publishes() {
        let id = client
            .publish_package(&File::new(&archive_path), reporter)
            .await?;
        reporter.set_output(PACKAGE_ID, &id).await;
        Some(id)
    } else {
        None
    };

    if !action.deploys() {
        return Ok(());
    }

    let package_id = match published_id {
        Some(id) => DeploymentPackageId::parse(&id)?,
        None => {
            let id = package_id_from_archive(&archive_path).await?;
            reporter.set_output(PACKAGE_ID, id.as_str()).await;
            id
        }
    };
    let environment = required(options.environment_id.as_deref(), "environmentId")?;

    DeploymentWorkflow::new(client, reporter, options.workflow.clone())
        .deploy(&package_id, environment, options.rollback)
        .await
}

/// Package id named by the manifest inside a DAR archive
pub async fn package_id_from_archive(archive_path: &Path) -> Result<DeploymentPackageId, ActionError> {
    let xml = archive::manifest_entry(archive_path).await?;
    DeploymentPackageId::from_manifest(&manifest::application(&xml)?, &manifest::version(&xml)?)
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, name: &str) -> Result<&'a T, ActionError> {
    value.ok_or_else(|| ActionError::InvalidInput(format!("Input '{}' is required.", name)))
}
