//! API models

use serde::{Deserialize, Serialize};

/// Server state response of `/server/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStateResponse {
    #[serde(rename = "current-mode")]
    pub current_mode: String,
}

/// Boolean envelope returned by the `exists` endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BooleanResponse {
    pub boolean: bool,
}

/// String envelope returned when a task is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringResponse {
    pub string: String,
}

/// Task description returned by `/tasks/v2/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Package upload response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Deployment object exchanged between the prepare, validate and
/// create calls. Only the server reads or reshapes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentObject(pub serde_json::Value);

impl DeploymentObject {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for DeploymentObject {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
