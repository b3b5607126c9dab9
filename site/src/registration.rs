//! Event registration flow
//!
//! One registration page is one [`RegistrationStore`]:
//!
//! ```text
//! Loading ──▶ Form ──submit──▶ Processing ──VALIDATED + ticket sent──▶ Success(ticket)
//!    │                            │
//!    ▼                            └──wait limit elapsed (if configured)──▶ TimedOut
//! Unavailable
//! ```
//!
//! While `Processing`, the registration status is read once after the probe
//! delay and then on a fixed interval. Every timer and read of that poll runs
//! under [`STATUS_POLL`], so reaching a terminal step or tearing the store
//! down stops it.

use crate::api::{DataSource, Loaded, SiteApi};
use crate::config::{DEFAULT_QR_SERVICE_URL, RegistrationConfig};
use crate::error::{FetchError, RegistrationError, is_plausible_email};
use crate::events::{Event, FallbackQuery};
use crate::money::Money;
use crate::ticket::{Confirmation, Ticket};
use chrono::{DateTime, Utc};
use rbe_client::{PaymentMethod, RegistrationReceipt, RegistrationRequest, RegistrationStatus};
use rbe_core::{
    SmallVec,
    effect::{Effect, EffectId},
    environment::Clock,
    reducer::Reducer,
    smallvec,
};
use rbe_runtime::Store;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Cancellation group of the status poll
pub const STATUS_POLL: EffectId = EffectId::new("registration.status_poll");

/// Cancellation group of the pending checkout redirect
pub const CHECKOUT_REDIRECT: EffectId = EffectId::new("registration.checkout_redirect");

/// Per-category ticket limit of the form
pub const MAX_TICKETS_PER_CATEGORY: u32 = 10;

// ============================================================================
// Event fetch
// ============================================================================

/// Load the event shown on the registration page
///
/// A missing or non-public event is terminal. When the API cannot be reached,
/// the copy of the event carried in the link's query string is used instead.
///
/// # Errors
///
/// - [`FetchError::NotFound`]: the API answered 404 or another client error
/// - [`FetchError::NotAccessible`]: the event is not flagged visible
/// - [`FetchError::Unreachable`]: the API is down and the query string has no title
pub async fn fetch_event(
    api: &dyn SiteApi,
    id: &str,
    query: &FallbackQuery,
) -> Result<Loaded<Event>, FetchError> {
    match api.get_event(id).await {
        Ok(record) => {
            let event = Event::from(record);
            if !event.extras.explicitly_visible() {
                tracing::info!(event_id = id, "Event is not public");
                return Err(FetchError::NotAccessible);
            }
            Ok(Loaded::live(event))
        },
        Err(error) if error.is_unavailable() => match query.degraded_event(id) {
            Some(event) => {
                tracing::warn!(event_id = id, %error, "API unavailable, using event details from the link");
                Ok(Loaded::fallback(event))
            },
            None => Err(FetchError::from(error)),
        },
        Err(error) => {
            tracing::info!(event_id = id, %error, "Event not found");
            Err(FetchError::NotFound)
        },
    }
}

// ============================================================================
// Pricing
// ============================================================================

/// `adult price × adults + child price × children`, or zero for a free event
#[must_use]
pub fn total(event: &Event, adult_tickets: u32, child_tickets: u32) -> Money {
    if event.is_free() {
        return Money::ZERO;
    }

    let adults = event
        .adult_price
        .unwrap_or(Money::ZERO)
        .saturating_multiply(adult_tickets);
    let children = event
        .child_price
        .unwrap_or(Money::ZERO)
        .saturating_multiply(child_tickets);
    adults.saturating_add(children)
}

/// Payment channel sent with the registration
#[must_use]
pub fn payment_method(event: &Event) -> PaymentMethod {
    if event.is_free() {
        PaymentMethod::Free
    } else if event.extras.registration_method == crate::events::RegistrationMethod::HelloAsso {
        PaymentMethod::HelloAsso
    } else {
        PaymentMethod::Internal
    }
}

// ============================================================================
// Redirects
// ============================================================================

/// Opens the external checkout for the participant
pub trait Redirector: Send + Sync {
    /// Open `url` in a new browsing context
    fn open(&self, url: &str);
}

/// Redirector for terminals: logs the URL for the user to follow
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRedirector;

impl Redirector for LogRedirector {
    fn open(&self, url: &str) {
        tracing::info!(url, "Continue payment on the external checkout");
    }
}

/// Redirector remembering every URL it was asked to open
#[derive(Debug, Default)]
pub struct RecordingRedirector {
    opened: Mutex<Vec<String>>,
}

impl RecordingRedirector {
    /// URLs opened so far
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Redirector for RecordingRedirector {
    fn open(&self, url: &str) {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}

// ============================================================================
// State
// ============================================================================

/// Where the registration page is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Fetching the event
    Loading,
    /// The event cannot be shown
    Unavailable(FetchError),
    /// Filling in the form
    Form,
    /// Registration created, waiting for validation
    Processing,
    /// Ticket issued
    Success(Ticket),
    /// Gave up waiting; the ticket will arrive by email
    TimedOut,
}

/// Form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    /// Participant name
    pub participant_name: String,
    /// Participant email
    pub participant_email: String,
    /// Adult tickets
    pub adult_tickets: u32,
    /// Child tickets
    pub child_tickets: u32,
}

impl RegistrationForm {
    /// Check the form against the event at `now`
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in field order.
    pub fn validate(&self, event: &Event, now: DateTime<Utc>) -> Result<(), RegistrationError> {
        if self.participant_name.trim().is_empty() {
            return Err(RegistrationError::MissingName);
        }
        if !is_plausible_email(&self.participant_email) {
            return Err(RegistrationError::InvalidEmail);
        }
        if self.adult_tickets.saturating_add(self.child_tickets) == 0 {
            return Err(RegistrationError::NoTickets);
        }
        if self.adult_tickets > MAX_TICKETS_PER_CATEGORY
            || self.child_tickets > MAX_TICKETS_PER_CATEGORY
        {
            return Err(RegistrationError::TooManyTickets {
                max: MAX_TICKETS_PER_CATEGORY,
            });
        }
        if !event.registration_button(now).accepts_registration() {
            return Err(RegistrationError::RegistrationClosed);
        }
        Ok(())
    }
}

/// Registration page state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationState {
    /// Event being registered for
    pub event_id: String,
    /// Query string of the link that led here
    pub query: FallbackQuery,
    /// Loaded event
    pub event: Option<Event>,
    /// Whether the event came from the API or from the link
    pub source: Option<DataSource>,
    /// Current step
    pub step: Step,
    /// Form fields
    pub form: RegistrationForm,
    /// A submission is in flight
    pub submitting: bool,
    /// Last error shown under the form
    pub error: Option<RegistrationError>,
    /// Server-side registration id
    pub registration_id: Option<String>,
    /// Payment channel of the submitted registration
    pub payment_method: Option<PaymentMethod>,
    /// External checkout the participant is sent to
    pub redirect_url: Option<String>,
    /// The checkout has been opened
    pub redirected: bool,
    /// Last status read while processing
    pub last_status: Option<String>,
}

impl RegistrationState {
    /// Fresh page for `event_id`, reached through a link with `query`
    #[must_use]
    pub fn new(event_id: impl Into<String>, query: FallbackQuery) -> Self {
        Self {
            event_id: event_id.into(),
            query,
            event: None,
            source: None,
            step: Step::Loading,
            form: RegistrationForm::default(),
            submitting: false,
            error: None,
            registration_id: None,
            payment_method: None,
            redirect_url: None,
            redirected: false,
            last_status: None,
        }
    }

    /// Total for the current form
    #[must_use]
    pub fn total(&self) -> Money {
        self.event.as_ref().map_or(Money::ZERO, |event| {
            total(event, self.form.adult_tickets, self.form.child_tickets)
        })
    }

    /// Issued ticket, once successful
    #[must_use]
    pub const fn ticket(&self) -> Option<&Ticket> {
        match &self.step {
            Step::Success(ticket) => Some(ticket),
            _ => None,
        }
    }

    /// Summary shown next to the ticket
    #[must_use]
    pub fn confirmation(&self) -> Option<Confirmation> {
        let ticket = self.ticket()?;
        let event = self.event.as_ref()?;
        Some(Confirmation::new(
            ticket,
            event,
            self.form.adult_tickets,
            self.form.child_tickets,
            self.total(),
            &self.form.participant_email,
        ))
    }

    /// Whether the page reached a step it never leaves
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.step,
            Step::Unavailable(_) | Step::Success(_) | Step::TimedOut
        )
    }

    fn editable(&self) -> bool {
        self.step == Step::Form && !self.submitting
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Registration page actions
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationAction {
    /// Page mounted: fetch the event
    Load,
    /// Event fetch finished
    EventLoaded(Result<Loaded<Event>, FetchError>),
    /// Name typed
    NameChanged(String),
    /// Email typed
    EmailChanged(String),
    /// Adult count changed
    AdultTicketsChanged(u32),
    /// Child count changed
    ChildTicketsChanged(u32),
    /// Form submitted
    Submit,
    /// Submission finished
    Submitted(Result<RegistrationReceipt, RegistrationError>),
    /// Redirect delay elapsed
    OpenCheckout(String),
    /// Checkout opened
    CheckoutOpened,
    /// First status read after entering `Processing`
    ProbeStatus,
    /// Interval status read
    PollTick,
    /// Status read finished (`None` when the read failed)
    StatusReceived {
        /// Registration the read was for
        registration_id: String,
        /// Status, if the read succeeded
        status: Option<RegistrationStatus>,
    },
    /// Wait limit elapsed
    PollTimedOut,
}

// ============================================================================
// Environment
// ============================================================================

/// Timings of the registration flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    /// Delay before the first status read
    pub probe_delay: Duration,
    /// Interval between status reads
    pub poll_interval: Duration,
    /// Give up after this long (never when `None`)
    pub poll_timeout: Option<Duration>,
    /// Delay before opening the checkout
    pub redirect_delay: Duration,
    /// QR code rendering service
    pub qr_service_url: String,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            probe_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            poll_timeout: None,
            redirect_delay: Duration::from_secs(1),
            qr_service_url: DEFAULT_QR_SERVICE_URL.to_string(),
        }
    }
}

impl From<&RegistrationConfig> for RegistrationSettings {
    fn from(config: &RegistrationConfig) -> Self {
        Self {
            probe_delay: config.status_probe_delay(),
            poll_interval: config.status_poll_interval(),
            poll_timeout: config.status_poll_timeout(),
            redirect_delay: config.redirect_delay(),
            qr_service_url: config.qr_service_url.clone(),
        }
    }
}

/// Registration page dependencies
#[derive(Clone)]
pub struct RegistrationEnvironment {
    /// Content API
    pub api: Arc<dyn SiteApi>,
    /// Opens the external checkout
    pub redirector: Arc<dyn Redirector>,
    /// Time source for registration deadlines
    pub clock: Arc<dyn Clock>,
    /// Timings
    pub settings: RegistrationSettings,
}

impl RegistrationEnvironment {
    /// Creates a new `RegistrationEnvironment`
    #[must_use]
    pub fn new(
        api: Arc<dyn SiteApi>,
        redirector: Arc<dyn Redirector>,
        clock: Arc<dyn Clock>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            api,
            redirector,
            clock,
            settings,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Registration page reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationReducer;

/// Store running one registration page
pub type RegistrationStore =
    Store<RegistrationState, RegistrationAction, RegistrationEnvironment, RegistrationReducer>;

/// Mount a registration page
#[must_use]
pub fn registration_store(state: RegistrationState, env: RegistrationEnvironment) -> RegistrationStore {
    Store::new(state, RegistrationReducer, env)
}

impl RegistrationReducer {
    fn load(state: &RegistrationState, env: &RegistrationEnvironment) -> Effect<RegistrationAction> {
        let api = Arc::clone(&env.api);
        let id = state.event_id.clone();
        let query = state.query.clone();

        Effect::Future(Box::pin(async move {
            Some(RegistrationAction::EventLoaded(
                fetch_event(api.as_ref(), &id, &query).await,
            ))
        }))
    }

    fn submit(
        state: &mut RegistrationState,
        env: &RegistrationEnvironment,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        let validation = state
            .event
            .as_ref()
            .ok_or(RegistrationError::EventNotLoaded)
            .and_then(|event| state.form.validate(event, env.clock.now()).map(|()| event));

        let event = match validation {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(%error, "Registration form rejected");
                state.error = Some(error);
                return SmallVec::new();
            },
        };

        let method = payment_method(event);
        let request = RegistrationRequest {
            event_id: event.id.clone(),
            participant_name: state.form.participant_name.trim().to_string(),
            participant_email: state.form.participant_email.trim().to_string(),
            adult_tickets: state.form.adult_tickets,
            child_tickets: state.form.child_tickets,
            payment_method: method,
        };

        tracing::info!(
            event_id = %request.event_id,
            payment_method = method.as_str(),
            total = state.total().cents(),
            "Submitting registration"
        );

        state.submitting = true;
        state.error = None;
        state.payment_method = Some(method);

        let api = Arc::clone(&env.api);
        smallvec![Effect::Future(Box::pin(async move {
            let result = api
                .create_registration(request)
                .await
                .map_err(|e| RegistrationError::SubmissionFailed(e.to_string()));
            Some(RegistrationAction::Submitted(result))
        }))]
    }

    fn start_polling(settings: &RegistrationSettings) -> Effect<RegistrationAction> {
        let mut timers = vec![
            Effect::delay(settings.probe_delay, RegistrationAction::ProbeStatus),
            Effect::delay(settings.poll_interval, RegistrationAction::PollTick),
        ];
        if let Some(limit) = settings.poll_timeout {
            timers.push(Effect::delay(limit, RegistrationAction::PollTimedOut));
        }
        Effect::merge(timers).cancellable(STATUS_POLL)
    }

    fn read_status(registration_id: &str, env: &RegistrationEnvironment) -> Effect<RegistrationAction> {
        let api = Arc::clone(&env.api);
        let registration_id = registration_id.to_string();

        Effect::Future(Box::pin(async move {
            let status = match api.registration_status(&registration_id).await {
                Ok(status) => Some(status),
                Err(error) => {
                    tracing::debug!(%error, "Status read failed, will retry");
                    None
                },
            };
            Some(RegistrationAction::StatusReceived {
                registration_id,
                status,
            })
        }))
    }
}

impl Reducer for RegistrationReducer {
    type State = RegistrationState;
    type Action = RegistrationAction;
    type Environment = RegistrationEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RegistrationAction::Load => {
                state.step = Step::Loading;
                smallvec![Self::load(state, env)]
            },

            RegistrationAction::EventLoaded(result) => {
                if state.step != Step::Loading {
                    return SmallVec::new();
                }
                match result {
                    Ok(loaded) => {
                        state.source = Some(loaded.source);
                        state.event = Some(loaded.value);
                        state.step = Step::Form;
                    },
                    Err(error) => state.step = Step::Unavailable(error),
                }
                SmallVec::new()
            },

            RegistrationAction::NameChanged(name) => {
                if state.editable() {
                    state.form.participant_name = name;
                    state.error = None;
                }
                SmallVec::new()
            },

            RegistrationAction::EmailChanged(email) => {
                if state.editable() {
                    state.form.participant_email = email;
                    state.error = None;
                }
                SmallVec::new()
            },

            RegistrationAction::AdultTicketsChanged(count) => {
                if state.editable() {
                    state.form.adult_tickets = count;
                    state.error = None;
                }
                SmallVec::new()
            },

            RegistrationAction::ChildTicketsChanged(count) => {
                if state.editable() {
                    state.form.child_tickets = count;
                    state.error = None;
                }
                SmallVec::new()
            },

            RegistrationAction::Submit => {
                if !state.editable() {
                    return SmallVec::new();
                }
                Self::submit(state, env)
            },

            RegistrationAction::Submitted(Ok(receipt)) => {
                if !state.submitting {
                    return SmallVec::new();
                }
                state.submitting = false;
                state.step = Step::Processing;
                state.registration_id = Some(receipt.registration_id.clone());

                tracing::info!(
                    registration_id = %receipt.registration_id,
                    "Registration created, waiting for validation"
                );

                let mut effects: SmallVec<[Effect<Self::Action>; 4]> =
                    smallvec![Self::start_polling(&env.settings)];

                let checkout = receipt
                    .hello_asso_url
                    .filter(|url| !url.trim().is_empty())
                    .filter(|_| state.payment_method == Some(PaymentMethod::HelloAsso));
                if let Some(url) = checkout {
                    state.redirect_url = Some(url.clone());
                    effects.push(
                        Effect::delay(
                            env.settings.redirect_delay,
                            RegistrationAction::OpenCheckout(url),
                        )
                        .cancellable(CHECKOUT_REDIRECT),
                    );
                }
                effects
            },

            RegistrationAction::Submitted(Err(error)) => {
                if !state.submitting {
                    return SmallVec::new();
                }
                tracing::warn!(%error, "Registration failed");
                state.submitting = false;
                state.error = Some(error);
                SmallVec::new()
            },

            RegistrationAction::OpenCheckout(url) => {
                let redirector = Arc::clone(&env.redirector);
                smallvec![Effect::Future(Box::pin(async move {
                    redirector.open(&url);
                    Some(RegistrationAction::CheckoutOpened)
                }))]
            },

            RegistrationAction::CheckoutOpened => {
                state.redirected = true;
                SmallVec::new()
            },

            RegistrationAction::ProbeStatus => match (&state.step, &state.registration_id) {
                (Step::Processing, Some(id)) => {
                    smallvec![Self::read_status(id, env).cancellable(STATUS_POLL)]
                },
                _ => SmallVec::new(),
            },

            RegistrationAction::PollTick => match (&state.step, &state.registration_id) {
                (Step::Processing, Some(id)) => smallvec![Effect::merge(vec![
                    Self::read_status(id, env),
                    Effect::delay(env.settings.poll_interval, RegistrationAction::PollTick),
                ])
                .cancellable(STATUS_POLL)],
                _ => SmallVec::new(),
            },

            RegistrationAction::StatusReceived {
                registration_id,
                status,
            } => {
                let current = state.step == Step::Processing
                    && state.registration_id.as_deref() == Some(registration_id.as_str());
                if !current {
                    tracing::trace!(%registration_id, "Ignoring stale status read");
                    return SmallVec::new();
                }
                let Some(status) = status else {
                    return SmallVec::new();
                };

                state.last_status = Some(status.status.clone());
                match Ticket::from_status(&registration_id, &status) {
                    Some(ticket) => {
                        tracing::info!(%registration_id, "Ticket issued");
                        state.step = Step::Success(ticket);
                        smallvec![Effect::Cancel(STATUS_POLL)]
                    },
                    None => SmallVec::new(),
                }
            },

            RegistrationAction::PollTimedOut => {
                if state.step != Step::Processing {
                    return SmallVec::new();
                }
                tracing::warn!(
                    registration_id = state.registration_id.as_deref().unwrap_or_default(),
                    "Gave up waiting for validation"
                );
                state.step = Step::TimedOut;
                smallvec![Effect::Cancel(STATUS_POLL)]
            },
        }
    }
}
