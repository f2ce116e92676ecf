//! HTTP client implementation

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::{ActionError, RequestStatus};

/// Deploy server address and credentials, fixed for the whole run
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
}

impl ServerConfig {
    pub fn new(base_url: &str, username: &str, password: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Timeout for a single API request
    pub request_timeout: Duration,

    /// Timeout for a package upload
    pub upload_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(600),
        }
    }
}

/// Authenticated client for the Deploy server REST API
pub struct DeployClient {
    client: Client,
    config: ServerConfig,
    upload_timeout: Duration,
}

impl DeployClient {
    /// Create a new client
    pub fn new(config: ServerConfig, settings: &ClientSettings) -> Result<Self, ActionError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ActionError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            upload_timeout: settings.upload_timeout,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    /// Start an authenticated request to `endpoint` (a path below the base URL)
    pub(crate) fn builder(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, endpoint);
        debug!("{} {}", method, url);

        self.client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
    }

    /// Make a JSON request. The body is only attached for non-GET methods.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<serde_json::Value, ActionError> {
        let mut request = self.builder(method.clone(), endpoint);
        if method != Method::GET {
            if let Some(body) = body {
                request = request.json(body);
            }
        }

        self.send(request, &method, endpoint).await
    }

    /// Make a JSON request and decode the response
    pub async fn request_as<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<T, ActionError> {
        let value = self.request(endpoint, method, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ActionError> {
        self.request_as::<T, ()>(endpoint, Method::GET, None).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ActionError> {
        self.request_as(endpoint, Method::POST, Some(body)).await
    }

    /// Make a POST request without a body
    pub async fn post_empty(&self, endpoint: &str) -> Result<serde_json::Value, ActionError> {
        self.request::<()>(endpoint, Method::POST, None).await
    }

    /// Send a prepared request, normalizing every failure to `RequestFailed`
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        method: &Method,
        endpoint: &str,
    ) -> Result<serde_json::Value, ActionError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("HTTP {} {} failed: no response ({})", method, endpoint, e);
                return Err(ActionError::RequestFailed {
                    status: RequestStatus::NoResponse,
                    body: serde_json::Value::String(e.to_string()),
                });
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!("HTTP {} {} failed reading body: {}", method, endpoint, e);
                return Err(ActionError::RequestFailed {
                    status: RequestStatus::Code(status.as_u16()),
                    body: serde_json::Value::String(e.to_string()),
                });
            }
        };
        let body = parse_body(&text);

        if !status.is_success() {
            error!("HTTP {} {} failed: {} - {}", method, endpoint, status, body);
            return Err(ActionError::RequestFailed {
                status: RequestStatus::Code(status.as_u16()),
                body,
            });
        }

        Ok(body)
    }
}

/// Empty bodies become `null`, anything that is not JSON a JSON string
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
