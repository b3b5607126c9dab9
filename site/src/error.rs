//! Error types for the site features

use rbe_client::ClientError;
use thiserror::Error;

/// Why a single record (event, vehicle, changelog) could not be shown
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The API answered with a client error status (404 and other 4xx)
    #[error("Not found")]
    NotFound,

    /// The event exists but is not publicly visible
    #[error("This event is not open to the public")]
    NotAccessible,

    /// The API is down (no response, 5xx, unreadable body) and no degraded
    /// copy was available
    #[error("Service unavailable ({0})")]
    Unreachable(String),
}

impl From<ClientError> for FetchError {
    fn from(error: ClientError) -> Self {
        if error.is_unavailable() {
            Self::Unreachable(error.to_string())
        } else {
            Self::NotFound
        }
    }
}

/// Registration form rejected before or during submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The event has not been loaded yet
    #[error("Event not loaded")]
    EventNotLoaded,

    /// Name is blank
    #[error("Participant name is required")]
    MissingName,

    /// Email is blank or lacks `@`
    #[error("A valid email address is required")]
    InvalidEmail,

    /// No ticket selected
    #[error("Select at least one ticket")]
    NoTickets,

    /// A ticket count exceeds the per-category limit
    #[error("At most {max} tickets per category")]
    TooManyTickets {
        /// Per-category limit
        max: u32,
    },

    /// The event does not take registrations through this form
    #[error("Registration is not open for this event")]
    RegistrationClosed,

    /// The API rejected or never received the submission
    #[error("Registration failed: {0}")]
    SubmissionFailed(String),
}

/// Newsletter signup and subscriber management errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewsletterError {
    /// Email is blank or lacks `@`
    #[error("A valid email address is required")]
    InvalidEmail,

    /// The API call failed
    #[error("Newsletter request failed: {0}")]
    Api(String),
}

/// Contact form errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    /// A required field is blank
    #[error("The {0} field is required")]
    MissingField(&'static str),

    /// Email lacks `@`
    #[error("A valid email address is required")]
    InvalidEmail,

    /// Relay keys are not configured
    #[error("Contact form is not configured")]
    MailerNotConfigured,

    /// The relay refused or could not be reached
    #[error("Message could not be sent: {0}")]
    Delivery(String),
}

/// Local persistence errors (dismissed flashes)
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file content is not the expected JSON
    #[error("Storage format invalid: {0}")]
    Format(#[from] serde_json::Error),
}

/// Shared email shape check used by every form
#[must_use]
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_at_sign() {
        assert!(is_plausible_email(" membre@rbe.fr "));
        assert!(!is_plausible_email("membre.rbe.fr"));
        assert!(!is_plausible_email("   "));
    }

    #[test]
    fn messages_render() {
        assert_eq!(
            RegistrationError::TooManyTickets { max: 10 }.to_string(),
            "At most 10 tickets per category"
        );
        assert_eq!(
            ContactError::MissingField("subject").to_string(),
            "The subject field is required"
        );
    }
}
