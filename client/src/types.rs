//! Wire types for the content API
//!
//! Field names follow the API's JSON (camelCase, and French names for vehicle
//! records); the Rust side uses English names.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept `"42"` or `42` for identifiers
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Extras arrive as a JSON-encoded string; some back-office versions send the object itself
fn extras_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// Events
// ============================================================================

/// Event record as published by `/public/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Event identifier
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Title
    pub title: String,
    /// Date (`YYYY-MM-DD`, sometimes a full timestamp)
    #[serde(default)]
    pub date: String,
    /// Start time (`HH:MM`)
    #[serde(default)]
    pub time: Option<String>,
    /// Location
    #[serde(default)]
    pub location: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Adult price in euros
    #[serde(default)]
    pub adult_price: Option<f64>,
    /// Child price in euros
    #[serde(default)]
    pub child_price: Option<f64>,
    /// Publication status (`PUBLISHED`, `DRAFT`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// External checkout URL
    #[serde(default)]
    pub hello_asso_url: Option<String>,
    /// JSON-encoded flags blob
    #[serde(default, deserialize_with = "extras_string")]
    pub extras: Option<String>,
}

// ============================================================================
// Registrations
// ============================================================================

/// How a registration is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Nothing to pay
    Free,
    /// External checkout
    HelloAsso,
    /// Paid on site or handled by the association
    Internal,
}

impl PaymentMethod {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::HelloAsso => "helloasso",
            Self::Internal => "internal",
        }
    }
}

/// Body of `POST /registrations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Event being registered for
    pub event_id: String,
    /// Participant name
    pub participant_name: String,
    /// Participant email
    pub participant_email: String,
    /// Adult tickets
    pub adult_tickets: u32,
    /// Child tickets
    pub child_tickets: u32,
    /// Payment channel
    pub payment_method: PaymentMethod,
}

/// Response of `POST /registrations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    /// Server-side registration id
    #[serde(deserialize_with = "id_string")]
    pub registration_id: String,
    /// Checkout URL when payment happens externally
    #[serde(default)]
    pub hello_asso_url: Option<String>,
}

/// Response of `GET /registrations/{id}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatus {
    /// Registration id, when echoed back
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// `PENDING`, `PROCESSING`, `VALIDATED`, or anything else the server sends
    pub status: String,
    /// Whether the ticket email went out
    #[serde(default)]
    pub ticket_sent: bool,
    /// Code checked at the door
    #[serde(default)]
    pub validation_code: Option<String>,
    /// Payload to encode in the scannable code
    #[serde(default)]
    pub qr_code: Option<String>,
}

impl RegistrationStatus {
    /// Validated and ticket sent
    #[must_use]
    pub fn is_ticket_issued(&self) -> bool {
        self.status == "VALIDATED" && self.ticket_sent
    }
}

// ============================================================================
// Newsletter
// ============================================================================

/// Response of `POST /newsletter/subscribe`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    /// The address was already subscribed
    #[serde(default)]
    pub duplicated: bool,
}

/// Newsletter subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// Subscriber id
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Email address
    pub email: String,
    /// `CONFIRMED`, `PENDING`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// Subscription timestamp
    #[serde(default)]
    pub created_at: Option<String>,
}

// ============================================================================
// Site content
// ============================================================================

/// Site-wide announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flash {
    /// Flash id
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Text shown in the banner
    #[serde(default)]
    pub content: String,
    /// `info`, `warning`, `success`, `error`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Published by the back-office
    #[serde(default)]
    pub active: bool,
    /// Expiry timestamp (RFC 3339)
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Branding and maintenance flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigRecord {
    /// Site name
    #[serde(default)]
    pub site_name: Option<String>,
    /// Tagline
    #[serde(default)]
    pub tagline: Option<String>,
    /// Logo URL
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Public pages replaced by a maintenance notice
    #[serde(default)]
    pub maintenance_mode: bool,
    /// Maintenance notice
    #[serde(default)]
    pub maintenance_message: Option<String>,
}

/// Vehicle characteristic (label and value may be any JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    /// Label
    #[serde(default)]
    pub label: serde_json::Value,
    /// Value
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Vehicle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    /// Fleet number
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Manufacturer
    #[serde(default, rename = "marque")]
    pub make: Option<String>,
    /// Model
    #[serde(default, rename = "modele")]
    pub model: Option<String>,
    /// Subtitle
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Registration plate
    #[serde(default, rename = "immat")]
    pub registration: Option<String>,
    /// Condition
    #[serde(default, rename = "etat")]
    pub condition: Option<String>,
    /// First registration date
    #[serde(default, rename = "miseEnCirculation")]
    pub in_service_since: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// History
    #[serde(default)]
    pub history: Option<String>,
    /// Hero background image
    #[serde(default)]
    pub background_image: Option<String>,
    /// CSS background position
    #[serde(default)]
    pub background_position: Option<String>,
    /// Gallery images
    #[serde(default)]
    pub gallery: Vec<String>,
    /// Technical characteristics
    #[serde(default, rename = "caracteristiques")]
    pub characteristics: Vec<Characteristic>,
}

/// Release notes entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    /// Version
    pub version: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Release date
    #[serde(default)]
    pub date: String,
    /// Changes
    #[serde(default)]
    pub changes: Vec<String>,
}
