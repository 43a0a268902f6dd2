use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("could not connect to messaging service")]
    Connect,
    #[error("messaging service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("http client error: {0}")]
    Http(String),
}

/// Register a contact with the messaging account before messaging it.
#[derive(Debug, Clone)]
pub struct ContactRegistration {
    pub endpoint: String,
    pub license_number: String,
    pub api_key: String,
    pub contact: String,
    pub name: String,
    pub tag: Option<String>,
}

/// Send a pre-approved template with one parameter.
#[derive(Debug, Clone)]
pub struct TemplateMessage {
    pub endpoint: String,
    pub license_number: String,
    pub api_key: String,
    pub contact: String,
    pub template: String,
    pub param: String,
    pub tag: Option<String>,
}

/// The remote WhatsApp messaging service. Responses are kept as raw JSON;
/// the dispatcher decides what counts as a failure.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn register_contact(&self, req: &ContactRegistration) -> Result<Value, GatewayError>;

    async fn send_template(&self, msg: &TemplateMessage) -> Result<Value, GatewayError>;
}

pub struct HttpGateway {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn new(timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self { client, timeout_secs })
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, GatewayError> {
        let response = self
            .client
            .get(endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }

        // Some deployments answer with plain text.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn classify(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            GatewayError::Connect
        } else {
            // The URL carries the API key in its query string.
            GatewayError::Http(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn register_contact(&self, req: &ContactRegistration) -> Result<Value, GatewayError> {
        let mut params = vec![
            ("LicenseNumber", req.license_number.as_str()),
            ("APIKey", req.api_key.as_str()),
            ("Contact", req.contact.as_str()),
            ("Name", req.name.as_str()),
        ];
        if let Some(tag) = &req.tag {
            params.push(("Tag", tag.as_str()));
        }
        self.get(&req.endpoint, &params).await
    }

    async fn send_template(&self, msg: &TemplateMessage) -> Result<Value, GatewayError> {
        let mut params = vec![
            ("LicenseNumber", msg.license_number.as_str()),
            ("APIKey", msg.api_key.as_str()),
            ("Contact", msg.contact.as_str()),
            ("Template", msg.template.as_str()),
            ("Param", msg.param.as_str()),
        ];
        if let Some(tag) = &msg.tag {
            params.push(("Tag", tag.as_str()));
        }
        self.get(&msg.endpoint, &params).await
    }
}
