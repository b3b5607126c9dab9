//! Content API seam
//!
//! Features talk to the API through [`SiteApi`] so reducers can be driven by
//! [`mock::MockSiteApi`] in tests and demos.

use rbe_client::{
    ChangelogEntry, ClientError, EventRecord, Flash, RegistrationReceipt, RegistrationRequest,
    RegistrationStatus, SiteClient, SiteConfigRecord, SubscribeResponse, Subscriber,
    VehicleRecord,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed API call
pub type ApiFuture<T, E = ClientError> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Where displayed data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fresh from the API
    Live,
    /// Built-in or degraded copy shown because the API failed
    Fallback,
}

/// A value together with its [`DataSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    /// The data
    pub value: T,
    /// Where it came from
    pub source: DataSource,
}

impl<T> Loaded<T> {
    /// Data from the API
    pub const fn live(value: T) -> Self {
        Self {
            value,
            source: DataSource::Live,
        }
    }

    /// Data from a fallback
    pub const fn fallback(value: T) -> Self {
        Self {
            value,
            source: DataSource::Fallback,
        }
    }

    /// Whether the page should warn about demo data
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }
}

/// Content API operations used by the site
pub trait SiteApi: Send + Sync {
    /// `GET /public/events`
    fn list_events(&self) -> ApiFuture<Vec<EventRecord>>;

    /// `GET /public/events/{id}`
    fn get_event(&self, id: &str) -> ApiFuture<EventRecord>;

    /// `POST /registrations`
    fn create_registration(&self, request: RegistrationRequest) -> ApiFuture<RegistrationReceipt>;

    /// `GET /registrations/{id}/status`
    fn registration_status(&self, id: &str) -> ApiFuture<RegistrationStatus>;

    /// `POST /newsletter/subscribe`
    fn subscribe(&self, email: &str) -> ApiFuture<SubscribeResponse>;

    /// `GET /newsletter`
    fn list_subscribers(&self) -> ApiFuture<Vec<Subscriber>>;

    /// `POST /newsletter`
    fn add_subscriber(&self, email: &str) -> ApiFuture<()>;

    /// `DELETE /newsletter/{id}`
    fn delete_subscriber(&self, id: &str) -> ApiFuture<()>;

    /// `GET /public/flashes`
    fn list_flashes(&self) -> ApiFuture<Vec<Flash>>;

    /// `GET /public/site-config`
    fn site_config(&self) -> ApiFuture<SiteConfigRecord>;

    /// `GET /public/vehicles`
    fn list_vehicles(&self) -> ApiFuture<Vec<VehicleRecord>>;

    /// `GET /public/vehicles/{id}`
    fn get_vehicle(&self, id: &str) -> ApiFuture<VehicleRecord>;

    /// `GET /public/vehicles/{id}/events`
    fn vehicle_events(&self, id: &str) -> ApiFuture<Vec<EventRecord>>;

    /// `GET /public/changelog`
    fn changelog(&self) -> ApiFuture<Vec<ChangelogEntry>>;
}

impl SiteApi for SiteClient {
    fn list_events(&self) -> ApiFuture<Vec<EventRecord>> {
        let client = self.clone();
        Box::pin(async move { client.list_events().await })
    }

    fn get_event(&self, id: &str) -> ApiFuture<EventRecord> {
        let client = self.clone();
        let id = id.to_string();
        Box::pin(async move { client.get_event(&id).await })
    }

    fn create_registration(&self, request: RegistrationRequest) -> ApiFuture<RegistrationReceipt> {
        let client = self.clone();
        Box::pin(async move { client.create_registration(&request).await })
    }

    fn registration_status(&self, id: &str) -> ApiFuture<RegistrationStatus> {
        let client = self.clone();
        let id = id.to_string();
        Box::pin(async move { client.registration_status(&id).await })
    }

    fn subscribe(&self, email: &str) -> ApiFuture<SubscribeResponse> {
        let client = self.clone();
        let email = email.to_string();
        Box::pin(async move { client.subscribe(&email).await })
    }

    fn list_subscribers(&self) -> ApiFuture<Vec<Subscriber>> {
        let client = self.clone();
        Box::pin(async move { client.list_subscribers().await })
    }

    fn add_subscriber(&self, email: &str) -> ApiFuture<()> {
        let client = self.clone();
        let email = email.to_string();
        Box::pin(async move { client.add_subscriber(&email).await })
    }

    fn delete_subscriber(&self, id: &str) -> ApiFuture<()> {
        let client = self.clone();
        let id = id.to_string();
        Box::pin(async move { client.delete_subscriber(&id).await })
    }

    fn list_flashes(&self) -> ApiFuture<Vec<Flash>> {
        let client = self.clone();
        Box::pin(async move { client.list_flashes().await })
    }

    fn site_config(&self) -> ApiFuture<SiteConfigRecord> {
        let client = self.clone();
        Box::pin(async move { client.site_config().await })
    }

    fn list_vehicles(&self) -> ApiFuture<Vec<VehicleRecord>> {
        let client = self.clone();
        Box::pin(async move { client.list_vehicles().await })
    }

    fn get_vehicle(&self, id: &str) -> ApiFuture<VehicleRecord> {
        let client = self.clone();
        let id = id.to_string();
        Box::pin(async move { client.get_vehicle(&id).await })
    }

    fn vehicle_events(&self, id: &str) -> ApiFuture<Vec<EventRecord>> {
        let client = self.clone();
        let id = id.to_string();
        Box::pin(async move { client.vehicle_events(&id).await })
    }

    fn changelog(&self) -> ApiFuture<Vec<ChangelogEntry>> {
        let client = self.clone();
        Box::pin(async move { client.changelog().await })
    }
}

/// In-memory API for tests and offline demos
pub mod mock {
    use super::{
        ApiFuture, ChangelogEntry, ClientError, EventRecord, Flash, RegistrationReceipt,
        RegistrationRequest, RegistrationStatus, SiteApi, SiteConfigRecord, SubscribeResponse,
        Subscriber, VehicleRecord,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Outcome of `POST /registrations`
    #[derive(Debug, Clone)]
    pub enum RegistrationOutcome {
        /// Accepted with this receipt
        Accepted(RegistrationReceipt),
        /// Rejected with this HTTP status
        Rejected(u16),
    }

    #[derive(Debug, Default)]
    struct MockData {
        events: Option<Vec<EventRecord>>,
        registration: Option<RegistrationOutcome>,
        statuses: VecDeque<RegistrationStatus>,
        subscribe: Option<SubscribeResponse>,
        subscribers: Option<Vec<Subscriber>>,
        flashes: Option<Vec<Flash>>,
        site_config: Option<SiteConfigRecord>,
        vehicles: Option<Vec<VehicleRecord>>,
        vehicle_events: Option<Vec<EventRecord>>,
        changelog: Option<Vec<ChangelogEntry>>,
        outage: Option<u16>,
        requests: Vec<String>,
        registrations: Vec<RegistrationRequest>,
    }

    /// Scriptable [`SiteApi`]
    ///
    /// Every endpoint that has not been given data behaves as if the API were
    /// unreachable. Status reads return the scripted statuses in order and then
    /// keep repeating the last one.
    #[derive(Debug, Default)]
    pub struct MockSiteApi {
        data: Mutex<MockData>,
    }

    impl MockSiteApi {
        /// An API that is unreachable everywhere
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Share as a trait object
        #[must_use]
        pub fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }

        fn with(self, f: impl FnOnce(&mut MockData)) -> Self {
            f(&mut self.data.lock().unwrap_or_else(PoisonError::into_inner));
            self
        }

        /// Answer unscripted endpoints with this HTTP status instead of
        /// being unreachable
        #[must_use]
        pub fn with_outage(self, status: u16) -> Self {
            self.with(|d| d.outage = Some(status))
        }

        /// Serve these events
        #[must_use]
        pub fn with_events(self, events: Vec<EventRecord>) -> Self {
            self.with(|d| d.events = Some(events))
        }

        /// Answer registrations this way
        #[must_use]
        pub fn with_registration(self, outcome: RegistrationOutcome) -> Self {
            self.with(|d| d.registration = Some(outcome))
        }

        /// Script status reads
        #[must_use]
        pub fn with_statuses(self, statuses: Vec<RegistrationStatus>) -> Self {
            self.with(|d| d.statuses = statuses.into())
        }

        /// Answer newsletter signups this way
        #[must_use]
        pub fn with_subscribe(self, response: SubscribeResponse) -> Self {
            self.with(|d| d.subscribe = Some(response))
        }

        /// Serve these subscribers
        #[must_use]
        pub fn with_subscribers(self, subscribers: Vec<Subscriber>) -> Self {
            self.with(|d| d.subscribers = Some(subscribers))
        }

        /// Serve these flashes
        #[must_use]
        pub fn with_flashes(self, flashes: Vec<Flash>) -> Self {
            self.with(|d| d.flashes = Some(flashes))
        }

        /// Serve this site configuration
        #[must_use]
        pub fn with_site_config(self, config: SiteConfigRecord) -> Self {
            self.with(|d| d.site_config = Some(config))
        }

        /// Serve these vehicles
        #[must_use]
        pub fn with_vehicles(self, vehicles: Vec<VehicleRecord>) -> Self {
            self.with(|d| d.vehicles = Some(vehicles))
        }

        /// Serve these events for every vehicle
        #[must_use]
        pub fn with_vehicle_events(self, events: Vec<EventRecord>) -> Self {
            self.with(|d| d.vehicle_events = Some(events))
        }

        /// Serve this changelog
        #[must_use]
        pub fn with_changelog(self, entries: Vec<ChangelogEntry>) -> Self {
            self.with(|d| d.changelog = Some(entries))
        }

        /// Replace the flash list while a banner is mounted
        pub fn set_flashes(&self, flashes: Vec<Flash>) {
            self.lock().flashes = Some(flashes);
        }

        /// Replace the remaining scripted statuses
        pub fn set_statuses(&self, statuses: Vec<RegistrationStatus>) {
            self.lock().statuses = statuses.into();
        }

        /// Requests received so far, as `METHOD /path`
        #[must_use]
        pub fn requests(&self) -> Vec<String> {
            self.lock().requests.clone()
        }

        /// Number of requests whose line starts with `prefix`
        #[must_use]
        pub fn count(&self, prefix: &str) -> usize {
            self.lock()
                .requests
                .iter()
                .filter(|r| r.starts_with(prefix))
                .count()
        }

        /// Registration bodies received so far
        #[must_use]
        pub fn registrations(&self) -> Vec<RegistrationRequest> {
            self.lock().registrations.clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, MockData> {
            self.data.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn respond<T: Send + 'static>(
            &self,
            request: String,
            answer: impl FnOnce(&mut MockData) -> Result<T, ClientError>,
        ) -> ApiFuture<T> {
            let result = {
                let mut data = self.lock();
                data.requests.push(request);
                answer(&mut data)
            };
            Box::pin(async move { result })
        }
    }

    fn unreachable() -> ClientError {
        ClientError::Unreachable("connection refused".to_string())
    }

    fn served<T: Clone>(value: Option<&T>, outage: Option<u16>) -> Result<T, ClientError> {
        value.cloned().ok_or_else(|| match outage {
            Some(status) => ClientError::Api {
                status,
                message: "service unavailable".to_string(),
            },
            None => unreachable(),
        })
    }

    impl SiteApi for MockSiteApi {
        fn list_events(&self) -> ApiFuture<Vec<EventRecord>> {
            self.respond("GET /public/events".into(), |d| served(d.events.as_ref(), d.outage))
        }

        fn get_event(&self, id: &str) -> ApiFuture<EventRecord> {
            let id = id.to_string();
            self.respond(format!("GET /public/events/{id}"), move |d| {
                served(d.events.as_ref(), d.outage)?
                    .into_iter()
                    .find(|e| e.id == id)
                    .ok_or_else(|| ClientError::NotFound(format!("/public/events/{id}")))
            })
        }

        fn create_registration(&self, request: RegistrationRequest) -> ApiFuture<RegistrationReceipt> {
            self.respond("POST /registrations".into(), move |d| {
                d.registrations.push(request);
                match served(d.registration.as_ref(), d.outage)? {
                    RegistrationOutcome::Accepted(receipt) => Ok(receipt),
                    RegistrationOutcome::Rejected(status) => Err(ClientError::Api {
                        status,
                        message: "rejected".to_string(),
                    }),
                }
            })
        }

        fn registration_status(&self, id: &str) -> ApiFuture<RegistrationStatus> {
            self.respond(format!("GET /registrations/{id}/status"), |d| {
                if d.statuses.len() > 1 {
                    d.statuses.pop_front().ok_or_else(unreachable)
                } else {
                    served(d.statuses.front(), d.outage)
                }
            })
        }

        fn subscribe(&self, _email: &str) -> ApiFuture<SubscribeResponse> {
            self.respond("POST /newsletter/subscribe".into(), |d| {
                served(d.subscribe.as_ref(), d.outage)
            })
        }

        fn list_subscribers(&self) -> ApiFuture<Vec<Subscriber>> {
            self.respond("GET /newsletter".into(), |d| served(d.subscribers.as_ref(), d.outage))
        }

        fn add_subscriber(&self, email: &str) -> ApiFuture<()> {
            let email = email.to_string();
            self.respond("POST /newsletter".into(), move |d| {
                let subscribers = d.subscribers.as_mut().ok_or_else(unreachable)?;
                let id = (subscribers.len() + 1).to_string();
                subscribers.push(Subscriber {
                    id,
                    email,
                    status: Some("PENDING".to_string()),
                    created_at: None,
                });
                Ok(())
            })
        }

        fn delete_subscriber(&self, id: &str) -> ApiFuture<()> {
            let id = id.to_string();
            self.respond(format!("DELETE /newsletter/{id}"), move |d| {
                let subscribers = d.subscribers.as_mut().ok_or_else(unreachable)?;
                let before = subscribers.len();
                subscribers.retain(|s| s.id != id);
                if subscribers.len() == before {
                    return Err(ClientError::NotFound(format!("/newsletter/{id}")));
                }
                Ok(())
            })
        }

        fn list_flashes(&self) -> ApiFuture<Vec<Flash>> {
            self.respond("GET /public/flashes".into(), |d| served(d.flashes.as_ref(), d.outage))
        }

        fn site_config(&self) -> ApiFuture<SiteConfigRecord> {
            self.respond("GET /public/site-config".into(), |d| {
                served(d.site_config.as_ref(), d.outage)
            })
        }

        fn list_vehicles(&self) -> ApiFuture<Vec<VehicleRecord>> {
            self.respond("GET /public/vehicles".into(), |d| served(d.vehicles.as_ref(), d.outage))
        }

        fn get_vehicle(&self, id: &str) -> ApiFuture<VehicleRecord> {
            let id = id.to_string();
            self.respond(format!("GET /public/vehicles/{id}"), move |d| {
                served(d.vehicles.as_ref(), d.outage)?
                    .into_iter()
                    .find(|v| v.id == id)
                    .ok_or_else(|| ClientError::NotFound(format!("/public/vehicles/{id}")))
            })
        }

        fn vehicle_events(&self, id: &str) -> ApiFuture<Vec<EventRecord>> {
            self.respond(format!("GET /public/vehicles/{id}/events"), |d| {
                served(d.vehicle_events.as_ref(), d.outage)
            })
        }

        fn changelog(&self) -> ApiFuture<Vec<ChangelogEntry>> {
            self.respond("GET /public/changelog".into(), |d| served(d.changelog.as_ref(), d.outage))
        }
    }
}
