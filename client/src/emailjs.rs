//! EmailJS REST relay
//!
//! The contact form has no backend of its own; messages go through
//! `POST https://api.emailjs.com/api/v1.0/email/send`.

use crate::error::ClientError;
use reqwest::Client;
use serde::Serialize;

/// Public EmailJS endpoint
pub const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Template variables of the contact template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactTemplateParams {
    /// Sender name
    pub from_name: String,
    /// Sender email
    pub from_email: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub message: String,
    /// Association inbox
    pub to_email: String,
    /// Where replies go
    pub reply_to: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a ContactTemplateParams,
}

/// EmailJS client bound to one service and template
#[derive(Debug, Clone)]
pub struct EmailJsClient {
    client: Client,
    endpoint: String,
    service_id: String,
    template_id: String,
    public_key: String,
}

impl EmailJsClient {
    /// Create a client for the given service, template and public key
    #[must_use]
    pub fn new(service_id: String, template_id: String, public_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: EMAILJS_SEND_URL.to_string(),
            service_id,
            template_id,
            public_key,
        }
    }

    /// Send to another endpoint (tests, self-hosted relays)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Send one templated email
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unreachable`] on transport failure and
    /// [`ClientError::Api`] when the relay rejects the message.
    #[tracing::instrument(skip(self, params), fields(subject = %params.subject))]
    pub async fn send(&self, params: &ContactTemplateParams) -> Result<(), ClientError> {
        let body = SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            template_params: params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "EmailJS rejected the message");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!("Contact message relayed");
        Ok(())
    }
}
