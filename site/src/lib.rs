//! # RBE Site
//!
//! Public site features of the RétroBus Essonne association.
//!
//! Pages with a workflow are reducers run by an [`rbe_runtime::Store`]:
//!
//! - [`registration`]: event registration, status polling and ticket issue
//! - [`newsletter`]: footer signup form
//! - [`flashes`]: announcement banner with periodic refresh
//!
//! Read-only pages are plain async functions over [`api::SiteApi`]:
//! [`events`], [`vehicles`], [`changelog`], [`site_config`], and the
//! [`contact`] relay.
//!
//! Every read that can fail has a defined fallback, reported through
//! [`api::Loaded`] so the page can warn about demo data.
//!
//! ## Example
//!
//! ```no_run
//! use rbe_site::api::SiteApi;
//! use rbe_site::config::Config;
//! use rbe_site::registration::{
//!     LogRedirector, RegistrationAction, RegistrationEnvironment, RegistrationSettings,
//!     RegistrationState, registration_store,
//! };
//! use rbe_site::events::FallbackQuery;
//! use rbe_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let api: Arc<dyn SiteApi> = Arc::new(rbe_client::SiteClient::new(&config.api.url)?);
//! let store = registration_store(
//!     RegistrationState::new("halloween2025", FallbackQuery::default()),
//!     RegistrationEnvironment::new(
//!         api,
//!         Arc::new(LogRedirector),
//!         Arc::new(SystemClock),
//!         RegistrationSettings::from(&config.registration),
//!     ),
//! );
//! store.send(RegistrationAction::Load).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod changelog;
pub mod config;
pub mod contact;
pub mod error;
pub mod events;
pub mod flashes;
pub mod money;
pub mod newsletter;
pub mod registration;
pub mod site_config;
pub mod ticket;
pub mod vehicles;

pub use api::{DataSource, Loaded, SiteApi};
pub use config::Config;
pub use error::{ContactError, FetchError, NewsletterError, RegistrationError, StorageError};
pub use events::{Event, EventExtras, RegistrationButton, RegistrationMethod};
pub use money::Money;
pub use ticket::{Confirmation, Ticket};
