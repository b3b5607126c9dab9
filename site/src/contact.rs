//! Contact form
//!
//! Messages are relayed by email; the site keeps nothing.

use crate::api::ApiFuture;
use crate::config::ContactConfig;
use crate::error::{ContactError, is_plausible_email};
use rbe_client::{ContactTemplateParams, EmailJsClient};
use std::sync::{Mutex, PoisonError};

/// Contact form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    /// Sender name
    pub name: String,
    /// Sender email
    pub email: String,
    /// Subject
    pub subject: String,
    /// Message
    pub message: String,
}

impl ContactForm {
    /// Check every field is filled and the email looks like one
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in field order.
    pub fn validate(&self) -> Result<(), ContactError> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("subject", &self.subject),
            ("message", &self.message),
        ];
        if let Some((field, _)) = fields.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ContactError::MissingField(field));
        }
        if !is_plausible_email(&self.email) {
            return Err(ContactError::InvalidEmail);
        }
        Ok(())
    }

    /// Template variables for a message to `recipient`
    #[must_use]
    pub fn template_params(&self, recipient: &str) -> ContactTemplateParams {
        let email = self.email.trim().to_string();
        ContactTemplateParams {
            from_name: self.name.trim().to_string(),
            from_email: email.clone(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            to_email: recipient.to_string(),
            reply_to: email,
        }
    }
}

/// Delivers contact messages
pub trait ContactMailer: Send + Sync {
    /// Send one message
    fn send(&self, params: ContactTemplateParams) -> ApiFuture<(), ContactError>;
}

/// Mailer relaying through EmailJS
#[derive(Debug, Clone)]
pub struct EmailJsMailer {
    client: EmailJsClient,
}

impl EmailJsMailer {
    /// Wrap an existing client
    #[must_use]
    pub const fn new(client: EmailJsClient) -> Self {
        Self { client }
    }

    /// Build the mailer from the configured relay keys
    ///
    /// # Errors
    ///
    /// [`ContactError::MailerNotConfigured`] when a key is missing.
    pub fn from_config(config: &ContactConfig) -> Result<Self, ContactError> {
        match (
            &config.emailjs_service_id,
            &config.emailjs_template_id,
            &config.emailjs_public_key,
        ) {
            (Some(service), Some(template), Some(key)) => Ok(Self::new(EmailJsClient::new(
                service.clone(),
                template.clone(),
                key.clone(),
            ))),
            _ => Err(ContactError::MailerNotConfigured),
        }
    }
}

impl ContactMailer for EmailJsMailer {
    fn send(&self, params: ContactTemplateParams) -> ApiFuture<(), ContactError> {
        let client = self.client.clone();
        Box::pin(async move {
            client
                .send(&params)
                .await
                .map_err(|e| ContactError::Delivery(e.to_string()))
        })
    }
}

/// Mailer keeping messages in memory
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<ContactTemplateParams>>,
}

impl RecordingMailer {
    /// Messages sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<ContactTemplateParams> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ContactMailer for RecordingMailer {
    fn send(&self, params: ContactTemplateParams) -> ApiFuture<(), ContactError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params);
        Box::pin(async { Ok(()) })
    }
}

/// Validate and send a contact message
///
/// # Errors
///
/// Validation errors are returned without sending; delivery failures as
/// [`ContactError::Delivery`].
pub async fn send_contact_message(
    mailer: &dyn ContactMailer,
    form: &ContactForm,
    recipient: &str,
) -> Result<(), ContactError> {
    form.validate()?;
    mailer.send(form.template_params(recipient)).await?;
    tracing::info!("Contact message sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::{Config, DEFAULT_CONTACT_RECIPIENT};

    fn form() -> ContactForm {
        ContactForm {
            name: " Jeanne ".into(),
            email: "jeanne@example.fr".into(),
            subject: "Adhésion".into(),
            message: "Bonjour, comment adhérer ?".into(),
        }
    }

    #[test]
    fn blank_fields_are_named() {
        let mut blank = form();
        blank.subject = "  ".into();
        assert_eq!(blank.validate(), Err(ContactError::MissingField("subject")));

        let mut bad = form();
        bad.email = "jeanne".into();
        assert_eq!(bad.validate(), Err(ContactError::InvalidEmail));
    }

    #[test]
    fn mailer_needs_every_key() {
        let config = Config::default().contact;
        assert!(matches!(
            EmailJsMailer::from_config(&config),
            Err(ContactError::MailerNotConfigured)
        ));

        let config = Config::from_lookup(|key| match key {
            "EMAILJS_SERVICE_ID" => Some("service_rbe".into()),
            "EMAILJS_TEMPLATE_ID" => Some("template_contact".into()),
            "EMAILJS_PUBLIC_KEY" => Some("pk".into()),
            _ => None,
        })
        .contact;
        assert!(EmailJsMailer::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn valid_message_is_relayed_with_reply_to() {
        let mailer = RecordingMailer::default();

        send_contact_message(&mailer, &form(), DEFAULT_CONTACT_RECIPIENT)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from_name, "Jeanne");
        assert_eq!(sent[0].reply_to, "jeanne@example.fr");
        assert_eq!(sent[0].to_email, "association.rbe@gmail.com");
    }

    #[tokio::test]
    async fn invalid_message_is_not_sent() {
        let mailer = RecordingMailer::default();
        let mut empty = form();
        empty.message.clear();

        assert!(send_contact_message(&mailer, &empty, DEFAULT_CONTACT_RECIPIENT).await.is_err());
        assert!(mailer.sent().is_empty());
    }
}
