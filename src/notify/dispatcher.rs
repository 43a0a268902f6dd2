use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::WhatsAppSettings;
use crate::mobile;

use super::gateway::{ContactRegistration, MessagingGateway, TemplateMessage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(alias = "Contact")]
    pub contact: String,
    #[serde(alias = "Param", alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "Tag")]
    pub tag: Option<String>,
    #[serde(default, alias = "Template")]
    pub template_override: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub request: NotificationRequest,
    /// Raw answer of the contact-registration call, `null` when it was skipped.
    #[serde(rename = "contactRegistrationOutcome")]
    pub contact_registration: Value,
    /// Raw answer of the template send, absent when the call itself failed.
    #[serde(rename = "sendOutcome")]
    pub send: Option<Value>,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub overall_succeeded: bool,
    pub results: Vec<NotificationResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No recipients provided")]
    EmptyBatch,
    #[error("Messaging is not configured: missing {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),
}

/// Settings the batch cannot run without, resolved once per batch.
struct Credentials {
    send_url: String,
    contact_url: Option<String>,
    license_number: String,
    api_key: String,
    default_template: String,
    default_tag: Option<String>,
}

impl Credentials {
    fn resolve(s: &WhatsAppSettings) -> Result<Self, DispatchError> {
        let mut missing = Vec::new();
        let mut need = |value: &Option<String>, key: &'static str| {
            if value.is_none() {
                missing.push(key);
            }
            value.clone().unwrap_or_default()
        };

        let send_url = need(&s.send_url, "WA_API_BASE");
        let license_number = need(&s.license_number, "LICENSE_NUMBER");
        let api_key = need(&s.api_key, "API_KEY");
        let default_template = need(&s.default_template, "TEMPLATE");

        if !missing.is_empty() {
            return Err(DispatchError::MissingConfiguration(missing));
        }
        Ok(Self {
            send_url,
            contact_url: s.contact_url.clone(),
            license_number,
            api_key,
            default_template,
            default_tag: s.default_tag.clone(),
        })
    }
}

/// Sends templated greetings, one recipient after another (or a few at a
/// time when `concurrency > 1`), and reports every recipient's outcome.
pub struct Dispatcher {
    gateway: Arc<dyn MessagingGateway>,
    settings: WhatsAppSettings,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn MessagingGateway>, settings: WhatsAppSettings) -> Self {
        Self { gateway, settings }
    }

    pub async fn dispatch(
        &self,
        requests: Vec<NotificationRequest>,
    ) -> Result<BatchResult, DispatchError> {
        if requests.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        let creds = Credentials::resolve(&self.settings).inspect_err(|e| {
            tracing::error!("dispatch refused: {e}");
        })?;

        let total = requests.len();
        tracing::info!(total, concurrency = self.settings.concurrency, "dispatch started");

        // `buffered` yields in input order regardless of completion order.
        let results: Vec<NotificationResult> = stream::iter(requests)
            .map(|req| self.deliver(&creds, req))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.succeeded).count();
        tracing::info!(total, failed, "dispatch finished");

        Ok(BatchResult {
            overall_succeeded: failed == 0,
            results,
        })
    }

    async fn deliver(&self, creds: &Credentials, request: NotificationRequest) -> NotificationResult {
        let contact = mobile::to_gateway_contact(&request.contact);
        if contact.is_empty() {
            return NotificationResult {
                request,
                contact_registration: Value::Null,
                send: None,
                succeeded: false,
                error: Some("contact is required".into()),
            };
        }
        let tag = request.tag.clone().or_else(|| creds.default_tag.clone());

        // Best effort: a failed registration does not stop the send.
        let contact_registration = match &creds.contact_url {
            Some(endpoint) => {
                let reg = ContactRegistration {
                    endpoint: endpoint.clone(),
                    license_number: creds.license_number.clone(),
                    api_key: creds.api_key.clone(),
                    contact: contact.clone(),
                    name: request.display_name.clone(),
                    tag: tag.clone(),
                };
                match self.gateway.register_contact(&reg).await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(%contact, "contact registration failed: {e}");
                        serde_json::json!({ "error": e.to_string() })
                    }
                }
            }
            None => Value::Null,
        };

        let msg = TemplateMessage {
            endpoint: creds.send_url.clone(),
            license_number: creds.license_number.clone(),
            api_key: creds.api_key.clone(),
            contact: contact.clone(),
            template: request
                .template_override
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| creds.default_template.clone()),
            param: request.display_name.clone(),
            tag,
        };

        match self.gateway.send_template(&msg).await {
            Ok(payload) => {
                let error = rejection_reason(&payload);
                match &error {
                    Some(reason) => tracing::warn!(%contact, "send rejected: {reason}"),
                    None => tracing::info!(%contact, "greeting sent"),
                }
                NotificationResult {
                    request,
                    contact_registration,
                    send: Some(payload),
                    succeeded: error.is_none(),
                    error,
                }
            }
            Err(e) => {
                tracing::warn!(%contact, "send failed: {e}");
                NotificationResult {
                    request,
                    contact_registration,
                    send: None,
                    succeeded: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Why a normally returned payload still counts as a failure, if it does.
fn rejection_reason(payload: &Value) -> Option<String> {
    let mentions_invalid = |s: &str| s.to_lowercase().contains("invalid");
    match payload {
        Value::String(s) if mentions_invalid(s) => Some(s.clone()),
        Value::Object(map) => {
            if let Some(err) = map.get("error").filter(|v| !v.is_null() && **v != Value::Bool(false)) {
                return Some(match err {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
            map.values().find_map(|v| match v {
                Value::String(s) if mentions_invalid(s) => Some(s.clone()),
                _ => None,
            })
        }
        _ => None,
    }
}
