//! Fleet pages
//!
//! Vehicle list, vehicle detail with the events the vehicle takes part in,
//! and resolution of the image paths the back-office stores.

use crate::api::{Loaded, SiteApi};
use crate::error::FetchError;
use crate::events::Event;
use futures::future::join;
use rbe_client::{Characteristic, VehicleRecord};
use serde_json::Value;

/// Hero image used when a vehicle has no usable picture
pub const DEFAULT_VEHICLE_BACKGROUND: &str = "/assets/fallback/_MG_1006.jpg";

/// Vehicle as the fleet pages show it
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    /// Wire record
    pub record: VehicleRecord,
}

impl From<VehicleRecord> for Vehicle {
    fn from(record: VehicleRecord) -> Self {
        Self { record }
    }
}

impl Vehicle {
    /// Fleet number
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// `make model`, or the fleet number when both are missing
    #[must_use]
    pub fn title(&self) -> String {
        let parts: Vec<&str> = [self.record.make.as_deref(), self.record.model.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            format!("Vehicle {}", self.record.id)
        } else {
            parts.join(" ")
        }
    }

    /// Year the vehicle entered service
    #[must_use]
    pub fn in_service_year(&self) -> Option<i32> {
        self.record
            .in_service_since
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }

    /// Characteristics as `(label, value)` text pairs
    #[must_use]
    pub fn characteristics(&self) -> Vec<(String, String)> {
        self.record
            .characteristics
            .iter()
            .map(|Characteristic { label, value }| (to_text(label), to_text(value)))
            .collect()
    }

    /// Hero image candidates, best first
    #[must_use]
    pub fn hero_candidates(&self, api_base: &str) -> Vec<String> {
        hero_candidates(
            api_base,
            self.record.background_image.as_deref(),
            &self.record.gallery,
        )
    }
}

/// Detail page content
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDetail {
    /// The vehicle
    pub vehicle: Vehicle,
    /// Events featuring it, newest first
    pub events: Vec<Event>,
}

// ============================================================================
// Loading
// ============================================================================

/// Fleet shown when the API cannot be reached
#[must_use]
pub fn fallback_fleet() -> Vec<Vehicle> {
    vec![Vehicle::from(VehicleRecord {
        id: "920".to_string(),
        make: Some("Mercedes‑Benz".to_string()),
        model: Some("Citaro".to_string()),
        subtitle: Some("Citaro 1 €2".to_string()),
        registration: Some("FG-920-RE".to_string()),
        condition: None,
        in_service_since: Some("2001-07-01".to_string()),
        description: Some(
            "Mise en service commerciale en juillet 2001. Ce véhicule est un exemple \
             emblématique de la gamme Citaro."
                .to_string(),
        ),
        history: None,
        background_image: None,
        background_position: None,
        gallery: vec![
            "/assets/vehicles/920_pres.jpg".to_string(),
            "/assets/vehicles/920_side.jpg".to_string(),
            "/assets/vehicles/920_back.jpg".to_string(),
        ],
        characteristics: Vec::new(),
    })]
}

/// Fleet list, or the built-in fleet when the API fails
pub async fn list_vehicles(api: &dyn SiteApi) -> Loaded<Vec<Vehicle>> {
    match api.list_vehicles().await {
        Ok(records) => Loaded::live(records.into_iter().map(Vehicle::from).collect()),
        Err(error) => {
            tracing::warn!(%error, "Vehicle list unavailable, showing built-in fleet");
            Loaded::fallback(fallback_fleet())
        },
    }
}

/// Vehicle detail with its events
///
/// Both reads run concurrently. A failed events read shows no events.
///
/// # Errors
///
/// - [`FetchError::NotFound`]: the API answered with a client error
/// - [`FetchError::Unreachable`]: the API is down
pub async fn vehicle_detail(api: &dyn SiteApi, id: &str) -> Result<VehicleDetail, FetchError> {
    let (vehicle, events) = join(api.get_vehicle(id), api.vehicle_events(id)).await;

    let vehicle = vehicle.inspect_err(|error| {
        tracing::info!(vehicle_id = id, %error, "Vehicle unavailable");
    })?;

    let mut events: Vec<Event> = events
        .inspect_err(|error| tracing::debug!(%error, "Vehicle events unavailable"))
        .unwrap_or_default()
        .into_iter()
        .map(Event::from)
        .collect();
    events.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(VehicleDetail {
        vehicle: Vehicle::from(vehicle),
        events,
    })
}

// ============================================================================
// Assets
// ============================================================================

/// Turn a stored image path into a URL
///
/// `data:` and `http…` sources are kept, `/assets/…` is a site asset, other
/// absolute paths are uploads served by the API, and relative paths are
/// joined to the API base.
#[must_use]
pub fn resolve_asset(api_base: &str, src: &str) -> String {
    let base = api_base.trim_end_matches('/');
    if src.starts_with("data:") || src.starts_with("http") || src.starts_with("/assets/") {
        src.to_string()
    } else if src.starts_with('/') {
        format!("{base}{src}")
    } else {
        format!("{base}/{src}")
    }
}

/// Background image, gallery, then the default image; blanks and duplicates removed
#[must_use]
pub fn hero_candidates(api_base: &str, background: Option<&str>, gallery: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let sources = background
        .into_iter()
        .chain(gallery.iter().map(String::as_str))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| resolve_asset(api_base, src))
        .chain(std::iter::once(DEFAULT_VEHICLE_BACKGROUND.to_string()));

    for src in sources {
        if !candidates.contains(&src) {
            candidates.push(src);
        }
    }
    candidates
}

/// Render any JSON value as display text
///
/// Arrays and objects are flattened into comma-separated values.
#[must_use]
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map.values().map(to_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
