//! Site branding and maintenance flags
//!
//! Loaded once and handed to every view as a [`SiteContext`] value.

use crate::api::{DataSource, SiteApi};
use rbe_client::SiteConfigRecord;

/// Site name when the API does not provide one
pub const DEFAULT_SITE_NAME: &str = "RétroBus Essonne";

/// Tagline when the API does not provide one
pub const DEFAULT_TAGLINE: &str = "Association de sauvegarde de bus anciens";

/// Maintenance notice when the API does not provide one
pub const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "Le site est en maintenance. Merci de revenir plus tard.";

/// Branding and maintenance state shared by the views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    /// Site name
    pub site_name: String,
    /// Tagline
    pub tagline: String,
    /// Logo URL
    pub logo_url: Option<String>,
    /// Public pages show the maintenance notice instead
    pub maintenance_mode: bool,
    /// Maintenance notice
    pub maintenance_message: String,
    /// Where the values came from
    pub source: DataSource,
}

impl Default for SiteContext {
    fn default() -> Self {
        Self {
            site_name: DEFAULT_SITE_NAME.to_string(),
            tagline: DEFAULT_TAGLINE.to_string(),
            logo_url: None,
            maintenance_mode: false,
            maintenance_message: DEFAULT_MAINTENANCE_MESSAGE.to_string(),
            source: DataSource::Fallback,
        }
    }
}

impl From<SiteConfigRecord> for SiteContext {
    fn from(record: SiteConfigRecord) -> Self {
        let defaults = Self::default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Self {
            site_name: non_empty(record.site_name).unwrap_or(defaults.site_name),
            tagline: non_empty(record.tagline).unwrap_or(defaults.tagline),
            logo_url: non_empty(record.logo_url),
            maintenance_mode: record.maintenance_mode,
            maintenance_message: non_empty(record.maintenance_message)
                .unwrap_or(defaults.maintenance_message),
            source: DataSource::Live,
        }
    }
}

impl SiteContext {
    /// Fetch the site configuration, falling back to defaults
    pub async fn load(api: &dyn SiteApi) -> Self {
        match api.site_config().await {
            Ok(record) => {
                let context = Self::from(record);
                if context.maintenance_mode {
                    tracing::info!("Site is in maintenance mode");
                }
                context
            },
            Err(error) => {
                tracing::warn!(%error, "Site configuration unavailable, using defaults");
                Self::default()
            },
        }
    }

    /// Whether a public page should show the maintenance notice
    #[must_use]
    pub const fn shows_maintenance(&self) -> bool {
        self.maintenance_mode
    }
}
