//! Tickets and confirmation summaries
//!
//! The scannable code image is rendered by an external QR service; this module
//! only builds the payload and the image URL.

use crate::events::Event;
use crate::money::Money;
use rbe_client::RegistrationStatus;
use serde_json::json;
use std::fmt;

/// Ticket issued once a registration is validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    registration_id: String,
    validation_code: String,
    payload: String,
}

impl Ticket {
    /// Build the ticket from a validated status
    ///
    /// Returns `None` unless the status is `VALIDATED` with the ticket sent.
    #[must_use]
    pub fn from_status(registration_id: &str, status: &RegistrationStatus) -> Option<Self> {
        if !status.is_ticket_issued() {
            return None;
        }

        let validation_code = status
            .validation_code
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| format!("RBE-{registration_id}"));

        let payload = status.qr_code.clone().filter(|q| !q.is_empty()).unwrap_or_else(|| {
            json!({
                "registrationId": registration_id,
                "validationCode": validation_code,
            })
            .to_string()
        });

        Some(Self {
            registration_id: registration_id.to_string(),
            validation_code,
            payload,
        })
    }

    /// Registration id
    #[must_use]
    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    /// Code checked at the door
    #[must_use]
    pub fn validation_code(&self) -> &str {
        &self.validation_code
    }

    /// String encoded into the scannable code
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Image URL of the scannable code
    #[must_use]
    pub fn qr_code_url(&self, qr_service_url: &str) -> String {
        qr_code_url(qr_service_url, &self.payload)
    }
}

/// `{base}?size=512x512&format=png&data={payload}` with the payload URL-encoded
#[must_use]
pub fn qr_code_url(qr_service_url: &str, payload: &str) -> String {
    format!(
        "{qr_service_url}?size=512x512&format=png&data={}",
        urlencoding::encode(payload)
    )
}

/// Text shown next to the ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Registration id
    pub registration_id: String,
    /// Event title
    pub event_title: String,
    /// Event date
    pub date: String,
    /// Event time
    pub time: Option<String>,
    /// Event location
    pub location: Option<String>,
    /// Adult tickets
    pub adult_tickets: u32,
    /// Child tickets
    pub child_tickets: u32,
    /// Amount due, `None` when free
    pub amount: Option<Money>,
    /// Where the ticket was emailed
    pub participant_email: String,
}

impl Confirmation {
    /// Summary of a validated registration
    #[must_use]
    pub fn new(
        ticket: &Ticket,
        event: &Event,
        adult_tickets: u32,
        child_tickets: u32,
        total: Money,
        participant_email: &str,
    ) -> Self {
        Self {
            registration_id: ticket.registration_id().to_string(),
            event_title: event.title.clone(),
            date: event.date.clone(),
            time: event.time.clone(),
            location: event.location.clone(),
            adult_tickets,
            child_tickets,
            amount: (!total.is_zero()).then_some(total),
            participant_email: participant_email.trim().to_string(),
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registration #{}", self.registration_id)?;
        write!(f, "{} on {}", self.event_title, self.date)?;
        if let Some(time) = &self.time {
            write!(f, " at {time}")?;
        }
        writeln!(f)?;
        if let Some(location) = &self.location {
            writeln!(f, "Location: {location}")?;
        }
        write!(f, "Tickets: {} adult", self.adult_tickets)?;
        if self.child_tickets > 0 {
            write!(f, ", {} child", self.child_tickets)?;
        }
        writeln!(f)?;
        if let Some(amount) = self.amount {
            writeln!(f, "Amount: {amount}")?;
        }
        write!(f, "Ticket sent to {}", self.participant_email)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::DEFAULT_QR_SERVICE_URL;
    use crate::events::demo_events;

    fn validated(qr_code: Option<&str>) -> RegistrationStatus {
        RegistrationStatus {
            id: None,
            status: "VALIDATED".into(),
            ticket_sent: true,
            validation_code: Some("RBE-4821".into()),
            qr_code: qr_code.map(str::to_string),
        }
    }

    #[test]
    fn no_ticket_before_validation() {
        let mut status = validated(None);
        status.ticket_sent = false;
        assert!(Ticket::from_status("12", &status).is_none());

        status.ticket_sent = true;
        status.status = "PENDING".into();
        assert!(Ticket::from_status("12", &status).is_none());
    }

    #[test]
    fn payload_prefers_server_qr_code() {
        let ticket = Ticket::from_status("12", &validated(Some("RBE|12|4821"))).unwrap();
        assert_eq!(ticket.payload(), "RBE|12|4821");
    }

    #[test]
    fn payload_falls_back_to_json() {
        let ticket = Ticket::from_status("12", &validated(None)).unwrap();
        let payload: serde_json::Value = serde_json::from_str(ticket.payload()).unwrap();

        assert_eq!(payload["registrationId"], "12");
        assert_eq!(payload["validationCode"], "RBE-4821");
    }

    #[test]
    fn qr_url_encodes_payload() {
        assert_eq!(
            qr_code_url(DEFAULT_QR_SERVICE_URL, "a b&c"),
            "https://api.qrserver.com/v1/create-qr-code/?size=512x512&format=png&data=a%20b%26c"
        );
    }

    #[test]
    fn confirmation_mentions_amount_only_when_paid() {
        let ticket = Ticket::from_status("12", &validated(None)).unwrap();
        let event = demo_events().remove(0);

        let paid = Confirmation::new(&ticket, &event, 2, 1, Money::from_euros(38), "a@b.fr");
        let text = paid.to_string();
        assert!(text.contains("Registration #12"));
        assert!(text.contains("RétroWouh ! Halloween on 2025-10-31 at 20:00"));
        assert!(text.contains("Tickets: 2 adult, 1 child"));
        assert!(text.contains("Amount: 38€"));

        let free = Confirmation::new(&ticket, &event, 1, 0, Money::ZERO, "a@b.fr");
        assert!(!free.to_string().contains("Amount"));
    }
}
