//! # RétroBus Essonne API Client
//!
//! Typed client for the association's content API (events, registrations,
//! newsletter, flashes, site configuration, vehicles, changelog) and for the
//! EmailJS relay used by the contact form.
//!
//! ## Example
//!
//! ```no_run
//! use rbe_client::SiteClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SiteClient::new("http://localhost:4000")?;
//!
//!     for event in client.list_events().await? {
//!         println!("{} {}", event.date, event.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod emailjs;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::SiteClient;
pub use emailjs::{ContactTemplateParams, EmailJsClient};
pub use error::ClientError;
pub use types::{
    ChangelogEntry, Characteristic, EventRecord, Flash, PaymentMethod, RegistrationReceipt,
    RegistrationRequest, RegistrationStatus, SiteConfigRecord, SubscribeResponse, Subscriber,
    VehicleRecord,
};
