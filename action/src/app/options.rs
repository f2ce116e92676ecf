//! Action inputs and configuration options

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

use crate::deploy::workflow::{WorkflowSettings, MIN_POLL_INTERVAL};
use crate::errors::ActionError;
use crate::http::client::{ClientSettings, ServerConfig};
use crate::logs::{LogLevel, LogOptions};

/// What the run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    Create,
    Publish,
    Deploy,
    CreatePublish,
    PublishDeploy,
    #[default]
    CreatePublishDeploy,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Publish,
        Action::Deploy,
        Action::CreatePublish,
        Action::PublishDeploy,
        Action::CreatePublishDeploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Publish => "publish",
            Action::Deploy => "deploy",
            Action::CreatePublish => "create_publish",
            Action::PublishDeploy => "publish_deploy",
            Action::CreatePublishDeploy => "create_publish_deploy",
        }
    }

    pub fn creates(&self) -> bool {
        matches!(
            self,
            Action::Create | Action::CreatePublish | Action::CreatePublishDeploy
        )
    }

    pub fn publishes(&self) -> bool {
        matches!(
            self,
            Action::Publish
                | Action::CreatePublish
                | Action::PublishDeploy
                | Action::CreatePublishDeploy
        )
    }

    pub fn deploys(&self) -> bool {
        matches!(
            self,
            Action::Deploy | Action::PublishDeploy | Action::CreatePublishDeploy
        )
    }

    /// Inputs that must be set, in the order they are checked
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            Action::Create | Action::CreatePublish => &["manifestPath", "outputPath"],
            Action::CreatePublishDeploy => &["manifestPath", "outputPath", "environmentId"],
            Action::Publish => &["darPackagePath"],
            Action::Deploy | Action::PublishDeploy => &["darPackagePath", "environmentId"],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Action::default());
        }
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let supported: Vec<&str> = Action::ALL.iter().map(Action::as_str).collect();
                ActionError::InvalidInput(format!(
                    "Invalid action: {}. Supported actions are: {}.",
                    s,
                    supported.join(", ")
                ))
            })
    }
}

/// Raw inputs, from flags or the `INPUT_*` variables set by the runner
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "deployit-action")]
#[command(about = "Package, publish and deploy DAR archives to a Deploy server")]
#[command(version)]
pub struct ActionInputs {
    /// create, publish, deploy, create_publish, publish_deploy or create_publish_deploy
    #[arg(long, env = "INPUT_ACTION")]
    pub action: Option<String>,

    /// Deploy server URL, e.g. https://deploy.example.com
    #[arg(long, env = "INPUT_SERVERURL")]
    pub server_url: Option<String>,

    #[arg(long, env = "INPUT_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "INPUT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path of the deployit-manifest.xml to package
    #[arg(long, env = "INPUT_MANIFESTPATH")]
    pub manifest_path: Option<String>,

    /// Directory receiving the DAR archive
    #[arg(long, env = "INPUT_OUTPUTPATH")]
    pub output_path: Option<String>,

    /// Archive name (".dar" is appended when missing)
    #[arg(long, env = "INPUT_PACKAGENAME")]
    pub package_name: Option<String>,

    /// Version written into the manifest before packaging
    #[arg(long, env = "INPUT_VERSIONNUMBER")]
    pub version_number: Option<String>,

    /// Existing DAR archive to publish or deploy
    #[arg(long, env = "INPUT_DARPACKAGEPATH")]
    pub dar_package_path: Option<String>,

    /// Target environment, with or without the Environments/ prefix
    #[arg(long, env = "INPUT_ENVIRONMENTID")]
    pub environment_id: Option<String>,

    /// Roll back a failed deployment
    #[arg(long, env = "INPUT_ROLLBACK")]
    pub rollback: Option<String>,

    /// Seconds between two polls of a running task
    #[arg(long, env = "INPUT_POLLINTERVAL")]
    pub poll_interval_secs: Option<String>,

    /// Give up on a deployment after this many seconds
    #[arg(long, env = "INPUT_DEADLINE")]
    pub deadline_secs: Option<String>,

    /// Timeout of a single HTTP request in seconds
    #[arg(long, env = "INPUT_REQUESTTIMEOUT")]
    pub request_timeout_secs: Option<String>,

    /// Timeout of the package upload in seconds
    #[arg(long, env = "INPUT_UPLOADTIMEOUT")]
    pub upload_timeout_secs: Option<String>,

    /// trace, debug, info, warn or error
    #[arg(long, env = "INPUT_LOGLEVEL")]
    pub log_level: Option<String>,

    /// Log one JSON object per line
    #[arg(long, env = "INPUT_LOGJSON")]
    pub log_json: Option<String>,
}

/// Validated run options
#[derive(Debug, Clone)]
pub struct ActionOptions {
    pub action: Action,
    pub server: ServerConfig,
    pub manifest_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub package_name: Option<String>,
    pub version_number: Option<String>,
    pub dar_package_path: Option<PathBuf>,
    pub environment_id: Option<String>,
    pub rollback: bool,
    pub workflow: WorkflowSettings,
    pub client: ClientSettings,
}

impl ActionOptions {
    /// Resolve raw inputs. Empty values count as unset.
    pub fn from_inputs(inputs: ActionInputs) -> Result<Self, ActionError> {
        let action: Action = non_empty(inputs.action).unwrap_or_default().parse()?;

        let (server_url, username, password) = match (
            non_empty(inputs.server_url),
            non_empty(inputs.username),
            non_empty(inputs.password),
        ) {
            (Some(url), Some(user), Some(password)) => (url, user, password),
            _ => {
                return Err(ActionError::InvalidInput(
                    "serverUrl, username, and password are required for all actions.".to_string(),
                ))
            }
        };
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(ActionError::InvalidInput(format!(
                "Input 'serverUrl' must be an http(s) URL, got '{}'.",
                server_url
            )));
        }

        let mut workflow = WorkflowSettings::default();
        if let Some(secs) = parse_secs("pollInterval", inputs.poll_interval_secs)? {
            if secs < MIN_POLL_INTERVAL {
                return Err(ActionError::InvalidInput(format!(
                    "Input 'pollInterval' must be at least {} seconds, got {}.",
                    MIN_POLL_INTERVAL.as_secs(),
                    secs.as_secs()
                )));
            }
            workflow.poll_interval = secs;
        }
        workflow.deadline = parse_secs("deadline", inputs.deadline_secs)?;

        let mut client = ClientSettings::default();
        if let Some(secs) = parse_secs("requestTimeout", inputs.request_timeout_secs)? {
            client.request_timeout = secs;
        }
        if let Some(secs) = parse_secs("uploadTimeout", inputs.upload_timeout_secs)? {
            client.upload_timeout = secs;
        }

        Ok(Self {
            action,
            server: ServerConfig::new(&server_url, &username, SecretString::from(password)),
            manifest_path: non_empty(inputs.manifest_path).map(PathBuf::from),
            output_path: non_empty(inputs.output_path).map(PathBuf::from),
            package_name: non_empty(inputs.package_name),
            version_number: non_empty(inputs.version_number),
            dar_package_path: non_empty(inputs.dar_package_path).map(PathBuf::from),
            environment_id: non_empty(inputs.environment_id),
            rollback: parse_bool("rollback", inputs.rollback)?,
            workflow,
            client,
        })
    }

    /// Check that every input the action needs is set
    pub fn validate_for_action(&self) -> Result<(), ActionError> {
        let missing = self
            .action
            .required_inputs()
            .iter()
            .copied()
            .find(|name| !self.has_input(name));

        match missing {
            Some(name) => Err(ActionError::InvalidInput(format!(
                "Input '{}' is required for action '{}'.",
                name, self.action
            ))),
            None => Ok(()),
        }
    }

    fn has_input(&self, name: &str) -> bool {
        match name {
            "manifestPath" => self.manifest_path.is_some(),
            "outputPath" => self.output_path.is_some(),
            "darPackagePath" => self.dar_package_path.is_some(),
            "environmentId" => self.environment_id.is_some(),
            _ => false,
        }
    }

    /// Logging options, read before the other inputs are validated
    pub fn log_options(inputs: &ActionInputs) -> Result<LogOptions, ActionError> {
        let log_level = match non_empty(inputs.log_level.clone()) {
            Some(level) => level
                .parse::<LogLevel>()
                .map_err(ActionError::InvalidInput)?,
            None => LogLevel::default(),
        };
        Ok(LogOptions {
            log_level,
            json_format: parse_bool("logJson", inputs.log_json.clone())?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool, ActionError> {
    match non_empty(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("false" | "no" | "n" | "off" | "0") => Ok(false),
        Some("true" | "yes" | "y" | "on" | "1") => Ok(true),
        Some(other) => Err(ActionError::InvalidInput(format!(
            "Input '{}' must be true or false, got '{}'.",
            name, other
        ))),
    }
}

fn parse_secs(name: &str, value: Option<String>) -> Result<Option<Duration>, ActionError> {
    non_empty(value)
        .map(|v| {
            v.parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ActionError::InvalidInput(format!(
                        "Input '{}' must be a positive number of seconds, got '{}'.",
                        name, v
                    ))
                })
        })
        .transpose()
}
