//! Repository identifiers used by the deployment workflow

use std::fmt;

use crate::errors::ActionError;
use crate::utils::starts_with_ignore_case;

pub const ENVIRONMENTS_ROOT: &str = "Environments/";
pub const APPLICATIONS_ROOT: &str = "Applications/";

/// Fully qualified environment id (`Environments/...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    /// Qualify an environment name, leaving an existing prefix (any case) alone
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        if starts_with_ignore_case(raw, ENVIRONMENTS_ROOT) {
            Self(raw.to_string())
        } else {
            Self(format!("{}{}", ENVIRONMENTS_ROOT, raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment package id (`Applications/<app...>/<version>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPackageId(String);

impl DeploymentPackageId {
    /// Build the id from the manifest `application` and `version` attributes
    pub fn from_manifest(application: &str, version: &str) -> Result<Self, ActionError> {
        let application = application.trim().trim_matches('/');
        let version = version.trim();
        if application.is_empty() || version.is_empty() || version.contains('/') {
            return Err(ActionError::InvalidManifest(format!(
                "cannot build a package id from application '{}' and version '{}'",
                application, version
            )));
        }

        let application = qualify_application(application);
        Ok(Self(format!("{}/{}", application, version)))
    }

    /// Parse an id as returned by the server
    pub fn parse(raw: &str) -> Result<Self, ActionError> {
        let raw = raw.trim();
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(ActionError::InvalidInput(format!(
                "'{}' is not a deployment package id",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id without its version segment, qualified with `Applications/`
    pub fn application_full_name(&self) -> String {
        let application = match self.0.rsplit_once('/') {
            Some((application, _version)) => application,
            None => self.0.as_str(),
        };
        qualify_application(application)
    }

    /// The application's own name (the segment before the version)
    pub fn application_name(&self) -> &str {
        let mut segments = self.0.rsplit('/');
        segments.next();
        segments.next().unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for DeploymentPackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn qualify_application(application: &str) -> String {
    if starts_with_ignore_case(application, APPLICATIONS_ROOT) {
        application.to_string()
    } else {
        format!("{}{}", APPLICATIONS_ROOT, application)
    }
}
