//! Configuration management for the site.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default content API
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Default QR code rendering service
pub const DEFAULT_QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Association inbox receiving contact messages
pub const DEFAULT_CONTACT_RECIPIENT: &str = "association.rbe@gmail.com";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Content API configuration
    pub api: ApiConfig,
    /// Registration and ticketing configuration
    pub registration: RegistrationConfig,
    /// Flash banner configuration
    pub flashes: FlashConfig,
    /// Contact form relay configuration
    pub contact: ContactConfig,
}

/// Content API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL
    pub url: String,
    /// Per-request timeout in seconds (none by default)
    pub http_timeout_secs: Option<u64>,
}

/// Registration and ticketing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// QR code rendering service
    pub qr_service_url: String,
    /// Delay before the first status probe in milliseconds (default: 2000)
    pub status_probe_delay_ms: u64,
    /// Status poll interval in milliseconds (default: 5000)
    pub status_poll_interval_ms: u64,
    /// Give up waiting for validation after this many seconds (default: wait forever)
    pub status_poll_timeout_secs: Option<u64>,
    /// Delay before opening the external checkout in milliseconds (default: 1000)
    pub redirect_delay_ms: u64,
}

/// Flash banner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashConfig {
    /// Refresh interval in seconds (default: 300)
    pub refresh_secs: u64,
    /// File remembering dismissed flash ids
    pub dismissed_path: PathBuf,
}

/// EmailJS relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactConfig {
    /// EmailJS service id
    pub emailjs_service_id: Option<String>,
    /// EmailJS template id
    pub emailjs_template_id: Option<String>,
    /// EmailJS public key
    pub emailjs_public_key: Option<String>,
    /// Inbox receiving the messages
    pub recipient: String,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| var(key).and_then(|s| s.trim().parse::<u64>().ok());
        // Zero is not a valid period or limit
        let positive = |key: &str| parsed(key).filter(|&n| n > 0);
        let non_empty = |key: &str| var(key).filter(|s| !s.trim().is_empty());

        Self {
            api: ApiConfig {
                url: non_empty("RBE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                http_timeout_secs: positive("RBE_HTTP_TIMEOUT_SECS"),
            },
            registration: RegistrationConfig {
                qr_service_url: non_empty("RBE_QR_SERVICE_URL")
                    .unwrap_or_else(|| DEFAULT_QR_SERVICE_URL.to_string()),
                status_probe_delay_ms: parsed("RBE_STATUS_PROBE_DELAY_MS").unwrap_or(2000),
                status_poll_interval_ms: positive("RBE_STATUS_POLL_INTERVAL_MS").unwrap_or(5000),
                status_poll_timeout_secs: positive("RBE_STATUS_POLL_TIMEOUT_SECS"),
                redirect_delay_ms: parsed("RBE_REDIRECT_DELAY_MS").unwrap_or(1000),
            },
            flashes: FlashConfig {
                refresh_secs: positive("RBE_FLASH_REFRESH_SECS").unwrap_or(300),
                dismissed_path: non_empty("RBE_DISMISSED_FLASHES_PATH")
                    .map_or_else(|| PathBuf::from(".rbe-dismissed-flashes.json"), PathBuf::from),
            },
            contact: ContactConfig {
                emailjs_service_id: non_empty("EMAILJS_SERVICE_ID"),
                emailjs_template_id: non_empty("EMAILJS_TEMPLATE_ID"),
                emailjs_public_key: non_empty("EMAILJS_PUBLIC_KEY"),
                recipient: non_empty("RBE_CONTACT_RECIPIENT")
                    .unwrap_or_else(|| DEFAULT_CONTACT_RECIPIENT.to_string()),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ApiConfig {
    /// Per-request timeout, if configured
    #[must_use]
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

impl RegistrationConfig {
    /// Delay before the first status probe
    #[must_use]
    pub const fn status_probe_delay(&self) -> Duration {
        Duration::from_millis(self.status_probe_delay_ms)
    }

    /// Status poll interval
    #[must_use]
    pub const fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    /// Overall wait limit, if configured
    #[must_use]
    pub fn status_poll_timeout(&self) -> Option<Duration> {
        self.status_poll_timeout_secs.map(Duration::from_secs)
    }

    /// Delay before opening the external checkout
    #[must_use]
    pub const fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

impl FlashConfig {
    /// Refresh interval
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_site_behaviour() {
        let config = Config::default();

        assert_eq!(config.api.url, "http://localhost:4000");
        assert_eq!(config.api.http_timeout(), None);
        assert_eq!(config.registration.status_probe_delay(), Duration::from_secs(2));
        assert_eq!(config.registration.status_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.registration.status_poll_timeout(), None);
        assert_eq!(config.registration.redirect_delay(), Duration::from_secs(1));
        assert_eq!(config.flashes.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.contact.recipient, "association.rbe@gmail.com");
        assert!(config.contact.emailjs_service_id.is_none());
    }

    #[test]
    fn overrides_are_read_and_garbage_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RBE_API_URL", "https://api.rbe.example"),
            ("RBE_STATUS_POLL_TIMEOUT_SECS", "600"),
            ("RBE_STATUS_POLL_INTERVAL_MS", "soon"),
            ("EMAILJS_SERVICE_ID", "  "),
            ("RBE_DISMISSED_FLASHES_PATH", "/tmp/flashes.json"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.api.url, "https://api.rbe.example");
        assert_eq!(
            config.registration.status_poll_timeout(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.registration.status_poll_interval_ms, 5000);
        assert_eq!(config.contact.emailjs_service_id, None);
        assert_eq!(config.flashes.dismissed_path, PathBuf::from("/tmp/flashes.json"));
    }

    #[test]
    fn zero_periods_fall_back_to_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RBE_STATUS_POLL_INTERVAL_MS", "0"),
            ("RBE_FLASH_REFRESH_SECS", "0"),
            ("RBE_STATUS_POLL_TIMEOUT_SECS", "0"),
            ("RBE_HTTP_TIMEOUT_SECS", "0"),
            ("RBE_STATUS_PROBE_DELAY_MS", "0"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.registration.status_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.flashes.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.registration.status_poll_timeout(), None);
        assert_eq!(config.api.http_timeout(), None);
        assert_eq!(config.registration.status_probe_delay(), Duration::ZERO);
    }
}
