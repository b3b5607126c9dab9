//! Event catalog and the registration button decision
//!
//! Events are published by the association's back-office. Per-event
//! registration behaviour lives in a JSON "extras" blob attached to each event.

use crate::api::{Loaded, SiteApi};
use crate::money::Money;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rbe_client::EventRecord;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Publication status of events shown to the public
pub const PUBLISHED: &str = "PUBLISHED";

// ============================================================================
// Extras
// ============================================================================

/// Channel through which a registration is completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationMethod {
    /// Form on this site
    #[default]
    Internal,
    /// External checkout
    HelloAsso,
    /// Printable form sent by post or email
    Pdf,
    /// No registration at all
    None,
}

impl RegistrationMethod {
    /// Parse the wire name; unknown names fall back to [`Self::Internal`]
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "helloasso" => Self::HelloAsso,
            "pdf" => Self::Pdf,
            "none" => Self::None,
            _ => Self::Internal,
        }
    }
}

impl<'de> Deserialize<'de> for RegistrationMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map_or(Self::Internal, |name| Self::parse(&name)))
    }
}

/// Accept `50`, `"50"` or nothing
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Per-event flags carried in the extras blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventExtras {
    /// Visibility flag; `None` when the blob does not mention it
    pub is_visible: Option<bool>,
    /// Attendance requires registering
    pub requires_registration: bool,
    /// Registration open to non-members
    pub allow_public_registration: bool,
    /// No charge
    pub is_free: bool,
    /// Registration channel
    pub registration_method: RegistrationMethod,
    /// Capacity
    #[serde(deserialize_with = "lenient_u32")]
    pub max_participants: Option<u32>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub registration_deadline: Option<String>,
}

impl EventExtras {
    /// Parse the blob; a malformed blob counts as no extras
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Self::default();
        };

        serde_json::from_str(raw).unwrap_or_else(|error| {
            tracing::warn!(%error, "Ignoring malformed event extras");
            Self::default()
        })
    }

    /// Listed as visible (a blob that says nothing counts as visible)
    #[must_use]
    pub fn listed_as_visible(&self) -> bool {
        self.is_visible != Some(false)
    }

    /// Explicitly flagged visible, as the registration page requires
    #[must_use]
    pub fn explicitly_visible(&self) -> bool {
        self.is_visible == Some(true)
    }

    /// Registration deadline as an instant
    ///
    /// A bare date closes at the end of that day (UTC).
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let raw = self.registration_deadline.as_deref()?.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
        Some(date.and_time(NaiveTime::from_hms_opt(23, 59, 59)?).and_utc())
    }
}

// ============================================================================
// Event
// ============================================================================

/// Public event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Identifier
    pub id: String,
    /// Title
    pub title: String,
    /// Date, `YYYY-MM-DD`
    pub date: String,
    /// Start time, `HH:MM`
    pub time: Option<String>,
    /// Location
    pub location: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Adult price
    pub adult_price: Option<Money>,
    /// Child price
    pub child_price: Option<Money>,
    /// Publication status
    pub status: Option<String>,
    /// External checkout URL
    pub hello_asso_url: Option<String>,
    /// Parsed flags
    pub extras: EventExtras,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        let extras = EventExtras::parse(record.extras.as_deref());
        Self {
            id: record.id,
            title: record.title,
            date: normalize_date(&record.date),
            time: record.time.filter(|t| !t.is_empty()),
            location: record.location.filter(|l| !l.is_empty()),
            description: record.description,
            adult_price: record.adult_price.and_then(Money::from_decimal_euros),
            child_price: record.child_price.and_then(Money::from_decimal_euros),
            status: record.status,
            hello_asso_url: record.hello_asso_url.filter(|u| !u.trim().is_empty()),
            extras,
        }
    }
}

/// Keep the `YYYY-MM-DD` prefix of a date or timestamp
#[must_use]
pub fn normalize_date(date: &str) -> String {
    date.chars().take(10).collect()
}

impl Event {
    /// Free when flagged so or when neither price is set to a non-zero amount
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.extras.is_free
            || (self.adult_price.is_none_or(|p| p.is_zero())
                && self.child_price.is_none_or(|p| p.is_zero()))
    }

    /// Whether this event is published
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status.as_deref() == Some(PUBLISHED)
    }

    /// Which registration button the event page shows at `now`
    #[must_use]
    pub fn registration_button(&self, now: DateTime<Utc>) -> RegistrationButton {
        RegistrationButton::decide(self, now)
    }

    /// Query string the list page appends to registration links
    ///
    /// The registration page rebuilds a degraded copy of the event from it
    /// when the API cannot be reached.
    #[must_use]
    pub fn registration_query(&self) -> String {
        let price = |p: Option<Money>| {
            p.map(|m| {
                if m.cents() % 100 == 0 {
                    (m.cents() / 100).to_string()
                } else {
                    format!("{}.{:02}", m.cents() / 100, m.cents() % 100)
                }
            })
            .unwrap_or_default()
        };

        format!(
            "title={}&date={}&time={}&location={}&adultPrice={}&childPrice={}",
            urlencoding::encode(&self.title),
            urlencoding::encode(&self.date),
            urlencoding::encode(self.time.as_deref().unwrap_or_default()),
            urlencoding::encode(self.location.as_deref().unwrap_or_default()),
            price(self.adult_price),
            price(self.child_price),
        )
    }
}

/// Decoded registration-link query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackQuery {
    params: HashMap<String, String>,
}

impl FallbackQuery {
    /// Parse `a=1&b=2` (a leading `?` is ignored)
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let params = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let decode = |s: &str| {
                    urlencoding::decode(&s.replace('+', " "))
                        .map(std::borrow::Cow::into_owned)
                        .ok()
                };
                Some((decode(key)?, decode(value)?))
            })
            .collect();
        Self { params }
    }

    /// Non-empty parameter value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Degraded event built from the query, when it carries a title
    #[must_use]
    pub fn degraded_event(&self, id: &str) -> Option<Event> {
        let title = self.get("title")?;
        let price = |key: &str| {
            self.get(key)
                .and_then(|p| p.trim().parse::<f64>().ok())
                .filter(|p| *p > 0.0)
                .and_then(Money::from_decimal_euros)
        };

        Some(Event {
            id: id.to_string(),
            title: title.to_string(),
            date: normalize_date(self.get("date").unwrap_or_default()),
            time: self.get("time").map(str::to_string),
            location: self.get("location").map(str::to_string),
            description: Some("Details unavailable".to_string()),
            adult_price: price("adultPrice"),
            child_price: price("childPrice"),
            status: None,
            hello_asso_url: None,
            extras: EventExtras {
                is_visible: Some(true),
                requires_registration: true,
                allow_public_registration: true,
                is_free: false,
                ..EventExtras::default()
            },
        })
    }
}

// ============================================================================
// Registration button
// ============================================================================

/// What the event page offers for registering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationButton {
    /// Open to everyone, no registration needed
    OpenPublic,
    /// Registration goes through the association directly
    ContactRequired,
    /// Register on the external checkout
    ExternalRedirect(String),
    /// Register with this site's form
    InternalForm,
    /// Registration closed
    Closed,
    /// Members-only outing, not advertised
    PrivateOuting,
}

impl RegistrationButton {
    /// Decide the button for `event` at `now`
    ///
    /// Rules apply in order; the first match wins.
    #[must_use]
    pub fn decide(event: &Event, now: DateTime<Utc>) -> Self {
        let extras = &event.extras;

        if !extras.listed_as_visible() {
            return Self::PrivateOuting;
        }
        if extras.deadline().is_some_and(|deadline| now > deadline) {
            return Self::Closed;
        }
        if !extras.requires_registration {
            return Self::OpenPublic;
        }
        if extras.registration_method == RegistrationMethod::None {
            return Self::Closed;
        }
        if !extras.allow_public_registration {
            return Self::ContactRequired;
        }

        match extras.registration_method {
            RegistrationMethod::HelloAsso => event
                .hello_asso_url
                .clone()
                .map_or(Self::ContactRequired, Self::ExternalRedirect),
            RegistrationMethod::Pdf => Self::ContactRequired,
            RegistrationMethod::Internal | RegistrationMethod::None => Self::InternalForm,
        }
    }

    /// Whether a registration can be submitted for this event
    #[must_use]
    pub const fn accepts_registration(&self) -> bool {
        matches!(self, Self::InternalForm | Self::ExternalRedirect(_))
    }

    /// Button caption
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OpenPublic => "Free entry, no registration",
            Self::ContactRequired => "Contact us to register",
            Self::ExternalRedirect(_) => "Register on HelloAsso",
            Self::InternalForm => "Register",
            Self::Closed => "Registration closed",
            Self::PrivateOuting => "Private outing",
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Built-in list shown when the API cannot be reached
#[must_use]
pub fn demo_events() -> Vec<Event> {
    vec![Event {
        id: "halloween2025".to_string(),
        title: "RétroWouh ! Halloween".to_string(),
        date: "2025-10-31".to_string(),
        time: Some("20:00".to_string()),
        location: Some("Salle des Fêtes de Villebon".to_string()),
        description: Some(
            "Soirée spéciale Halloween avec animations, musique et surprises !".to_string(),
        ),
        adult_price: Some(Money::from_euros(15)),
        child_price: Some(Money::from_euros(8)),
        status: Some(PUBLISHED.to_string()),
        hello_asso_url: None,
        extras: EventExtras {
            is_visible: Some(true),
            requires_registration: true,
            allow_public_registration: true,
            ..EventExtras::default()
        },
    }]
}

/// Published events, or the demo list when the API fails
pub async fn load_catalog(api: &dyn SiteApi) -> Loaded<Vec<Event>> {
    match api.list_events().await {
        Ok(records) => {
            let events: Vec<Event> = records
                .into_iter()
                .map(Event::from)
                .filter(Event::is_published)
                .collect();
            tracing::info!(count = events.len(), "Loaded event catalog");
            Loaded::live(events)
        },
        Err(error) => {
            tracing::warn!(%error, "Event catalog unavailable, showing demo data");
            Loaded::fallback(demo_events())
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::api::mock::MockSiteApi;
    use rbe_core::environment::Clock;
    use rbe_testing::FixedClock;

    fn event(extras: &str) -> Event {
        Event {
            hello_asso_url: Some("https://www.helloasso.com/rbe/halloween".into()),
            extras: EventExtras::parse(Some(extras)),
            ..demo_events().remove(0)
        }
    }

    fn now() -> DateTime<Utc> {
        FixedClock::at("2025-10-01T12:00:00Z").now()
    }

    fn record(id: &str, status: &str, date: &str) -> EventRecord {
        EventRecord {
            id: id.into(),
            title: format!("Sortie {id}"),
            date: date.into(),
            time: None,
            location: None,
            description: None,
            adult_price: None,
            child_price: None,
            status: Some(status.into()),
            hello_asso_url: None,
            extras: None,
        }
    }

    #[test]
    fn decision_table_rows() {
        let cases = [
            (r#"{"isVisible":false,"requiresRegistration":true}"#, RegistrationButton::PrivateOuting),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationDeadline":"2025-09-30"}"#,
                RegistrationButton::Closed,
            ),
            (r#"{"isVisible":true,"requiresRegistration":false}"#, RegistrationButton::OpenPublic),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationMethod":"none"}"#,
                RegistrationButton::Closed,
            ),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":false}"#,
                RegistrationButton::ContactRequired,
            ),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationMethod":"helloasso"}"#,
                RegistrationButton::ExternalRedirect("https://www.helloasso.com/rbe/halloween".into()),
            ),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationMethod":"pdf"}"#,
                RegistrationButton::ContactRequired,
            ),
            (
                r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true}"#,
                RegistrationButton::InternalForm,
            ),
        ];

        for (extras, expected) in cases {
            assert_eq!(event(extras).registration_button(now()), expected, "extras: {extras}");
        }
    }

    #[test]
    fn helloasso_without_url_needs_contact() {
        let mut e = event(
            r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationMethod":"helloasso"}"#,
        );
        e.hello_asso_url = None;
        assert_eq!(e.registration_button(now()), RegistrationButton::ContactRequired);
    }

    #[test]
    fn deadline_date_closes_at_end_of_day() {
        let e = event(
            r#"{"isVisible":true,"requiresRegistration":true,"allowPublicRegistration":true,"registrationDeadline":"2025-10-01"}"#,
        );
        assert_eq!(e.registration_button(now()), RegistrationButton::InternalForm);

        let later = FixedClock::at("2025-10-02T00:00:00Z").now();
        assert_eq!(e.registration_button(later), RegistrationButton::Closed);
    }

    #[test]
    fn extras_parsing_is_lenient() {
        let extras = EventExtras::parse(Some(
            r#"{"registrationMethod":"HelloAsso","maxParticipants":"40","unknown":1}"#,
        ));
        assert_eq!(extras.registration_method, RegistrationMethod::HelloAsso);
        assert_eq!(extras.max_participants, Some(40));
        assert!(extras.listed_as_visible());
        assert!(!extras.explicitly_visible());

        assert_eq!(
            EventExtras::parse(Some(r#"{"registrationMethod":"carrier-pigeon"}"#)).registration_method,
            RegistrationMethod::Internal
        );
        assert_eq!(EventExtras::parse(Some("{not json")), EventExtras::default());
        assert_eq!(EventExtras::parse(None), EventExtras::default());
    }

    #[test]
    fn free_when_flagged_or_unpriced() {
        let mut e = demo_events().remove(0);
        assert!(!e.is_free());

        e.extras.is_free = true;
        assert!(e.is_free());

        e.extras.is_free = false;
        e.adult_price = None;
        e.child_price = Some(Money::ZERO);
        assert!(e.is_free());
    }

    #[test]
    fn registration_query_feeds_degraded_event() {
        let original = demo_events().remove(0);
        let query = FallbackQuery::parse(&format!("?{}", original.registration_query()));

        let degraded = query.degraded_event("halloween2025").unwrap();
        assert_eq!(degraded.title, "RétroWouh ! Halloween");
        assert_eq!(degraded.location.as_deref(), Some("Salle des Fêtes de Villebon"));
        assert_eq!(degraded.adult_price, Some(Money::from_euros(15)));
        assert_eq!(degraded.child_price, Some(Money::from_euros(8)));
        assert_eq!(degraded.description.as_deref(), Some("Details unavailable"));
        assert!(degraded.extras.explicitly_visible());
        assert_eq!(degraded.registration_button(now()), RegistrationButton::InternalForm);
    }

    #[test]
    fn query_without_title_has_no_degraded_event() {
        assert!(FallbackQuery::parse("date=2025-10-31").degraded_event("x").is_none());
        assert!(FallbackQuery::parse("").degraded_event("x").is_none());
    }

    #[tokio::test]
    async fn catalog_keeps_published_and_normalizes_dates() {
        let api = MockSiteApi::new().with_events(vec![
            record("a", "PUBLISHED", "2025-06-01T00:00:00.000Z"),
            record("b", "DRAFT", "2025-06-02"),
        ]);

        let catalog = load_catalog(&api).await;

        assert!(!catalog.is_fallback());
        assert_eq!(catalog.value.len(), 1);
        assert_eq!(catalog.value[0].id, "a");
        assert_eq!(catalog.value[0].date, "2025-06-01");
    }

    #[tokio::test]
    async fn catalog_falls_back_to_demo_event() {
        let catalog = load_catalog(&MockSiteApi::new()).await;

        assert!(catalog.is_fallback());
        assert_eq!(catalog.value[0].id, "halloween2025");
        assert_eq!(catalog.value[0].time.as_deref(), Some("20:00"));
    }
}
