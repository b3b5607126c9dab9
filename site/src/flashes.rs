//! Flash announcement banner
//!
//! The banner fetches the active announcements when mounted and again every
//! refresh interval until it is torn down. Dismissed ids are kept in a
//! [`DismissedStore`] handed in through the environment.

use crate::api::SiteApi;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use rbe_client::Flash;
use rbe_core::{
    SmallVec,
    effect::{Effect, EffectId},
    environment::Clock,
    reducer::Reducer,
    smallvec,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Cancellation group of the periodic refresh
pub const FLASH_REFRESH: EffectId = EffectId::new("flashes.refresh");

/// Key the dismissed set is stored under
pub const DISMISSED_KEY: &str = "rbe-dismissed-flashes";

// ============================================================================
// Flash items
// ============================================================================

/// Banner style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlashKind {
    /// Neutral information
    #[default]
    Info,
    /// Warning
    Warning,
    /// Good news
    Success,
    /// Incident
    Error,
}

impl FlashKind {
    /// Parse a flash type, treating unknown values as `Info`
    #[must_use]
    pub fn parse(kind: Option<&str>) -> Self {
        match kind.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
            Some("warning") => Self::Warning,
            Some("success") => Self::Success,
            Some("error") => Self::Error,
            _ => Self::Info,
        }
    }
}

/// When a flash stops being shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Shown until deactivated
    Never,
    /// Hidden from this instant
    At(DateTime<Utc>),
    /// Unparseable timestamp, treated as expired
    Invalid,
}

impl Expiry {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::Never,
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|at| Self::At(at.with_timezone(&Utc)))
                .unwrap_or(Self::Invalid),
        }
    }

    fn is_past(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::At(at) => *at <= now,
            Self::Invalid => true,
        }
    }
}

/// Announcement as the banner sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashItem {
    /// Flash id
    pub id: String,
    /// Text
    pub content: String,
    /// Style
    pub kind: FlashKind,
    /// Published by the back-office
    pub active: bool,
    /// Expiry
    pub expiry: Expiry,
}

impl From<Flash> for FlashItem {
    fn from(flash: Flash) -> Self {
        Self {
            kind: FlashKind::parse(flash.kind.as_deref()),
            expiry: Expiry::parse(flash.expires_at.as_deref()),
            id: flash.id,
            content: flash.content,
            active: flash.active,
        }
    }
}

impl FlashItem {
    /// Whether the banner shows this flash at `now`
    #[must_use]
    pub fn is_shown(&self, now: DateTime<Utc>, dismissed: &BTreeSet<String>) -> bool {
        self.active && !dismissed.contains(&self.id) && !self.expiry.is_past(now)
    }
}

// ============================================================================
// Dismissed set persistence
// ============================================================================

/// Where dismissed flash ids survive between sessions
pub trait DismissedStore: Send + Sync {
    /// Read the dismissed ids (empty when nothing was stored yet)
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the stored data cannot be read.
    fn load(&self) -> Result<BTreeSet<String>, StorageError>;

    /// Add `ids` to the stored set and return the whole set
    ///
    /// Concurrent merges never lose each other's ids.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the stored data cannot be read or written.
    fn merge(&self, ids: &BTreeSet<String>) -> Result<BTreeSet<String>, StorageError>;
}

/// JSON array of ids in a file
#[derive(Debug)]
pub struct FileDismissedStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileDismissedStore {
    /// Store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<BTreeSet<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl DismissedStore for FileDismissedStore {
    fn load(&self) -> Result<BTreeSet<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    fn merge(&self, ids: &BTreeSet<String>) -> Result<BTreeSet<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stored = self.read()?;
        stored.extend(ids.iter().cloned());
        std::fs::write(&self.path, serde_json::to_string(&stored)?)?;
        Ok(stored)
    }
}

/// In-memory store for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryDismissedStore {
    ids: Mutex<BTreeSet<String>>,
}

impl DismissedStore for MemoryDismissedStore {
    fn load(&self) -> Result<BTreeSet<String>, StorageError> {
        Ok(self.ids.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn merge(&self, ids: &BTreeSet<String>) -> Result<BTreeSet<String>, StorageError> {
        let mut stored = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        stored.extend(ids.iter().cloned());
        Ok(stored.clone())
    }
}

// ============================================================================
// Banner feature
// ============================================================================

/// Banner state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashBannerState {
    /// Last fetched flashes
    pub flashes: Vec<FlashItem>,
    /// Dismissed ids
    pub dismissed: BTreeSet<String>,
    /// At least one fetch succeeded
    pub loaded: bool,
    /// At least one fetch finished
    pub attempted: bool,
}

impl FlashBannerState {
    /// Flashes to show at `now`
    #[must_use]
    pub fn active(&self, now: DateTime<Utc>) -> Vec<&FlashItem> {
        self.flashes
            .iter()
            .filter(|flash| flash.is_shown(now, &self.dismissed))
            .collect()
    }
}

/// Banner actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashBannerAction {
    /// Banner mounted
    Mount,
    /// Refresh interval elapsed
    Refresh,
    /// Stored dismissed ids read or merged
    DismissedLoaded(BTreeSet<String>),
    /// Fetch finished (`None` on failure)
    Fetched(Option<Vec<Flash>>),
    /// Visitor closed a flash
    Dismiss(String),
    /// Banner unmounted
    Unmount,
}

/// Banner dependencies
#[derive(Clone)]
pub struct FlashBannerEnvironment {
    /// Content API
    pub api: Arc<dyn SiteApi>,
    /// Dismissed ids persistence
    pub dismissed: Arc<dyn DismissedStore>,
    /// Time source for expiry
    pub clock: Arc<dyn Clock>,
    /// Refresh interval
    pub refresh_interval: Duration,
}

impl FlashBannerEnvironment {
    /// Creates a new `FlashBannerEnvironment`
    #[must_use]
    pub fn new(
        api: Arc<dyn SiteApi>,
        dismissed: Arc<dyn DismissedStore>,
        clock: Arc<dyn Clock>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            api,
            dismissed,
            clock,
            refresh_interval,
        }
    }
}

/// Banner reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashBannerReducer;

impl FlashBannerReducer {
    fn fetch_and_reschedule(env: &FlashBannerEnvironment) -> Effect<FlashBannerAction> {
        let api = Arc::clone(&env.api);
        let fetch = Effect::Future(Box::pin(async move {
            match api.list_flashes().await {
                Ok(flashes) => Some(FlashBannerAction::Fetched(Some(flashes))),
                Err(error) => {
                    tracing::debug!(%error, "Flash refresh failed, keeping previous list");
                    Some(FlashBannerAction::Fetched(None))
                },
            }
        }));

        Effect::merge(vec![
            fetch,
            Effect::delay(env.refresh_interval, FlashBannerAction::Refresh),
        ])
        .cancellable(FLASH_REFRESH)
    }
}

impl Reducer for FlashBannerReducer {
    type State = FlashBannerState;
    type Action = FlashBannerAction;
    type Environment = FlashBannerEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FlashBannerAction::Mount => {
                let store = Arc::clone(&env.dismissed);
                let load = Effect::Future(Box::pin(async move {
                    let ids = store.load().unwrap_or_else(|error| {
                        tracing::warn!(%error, key = DISMISSED_KEY, "Ignoring unreadable dismissed flashes");
                        BTreeSet::new()
                    });
                    Some(FlashBannerAction::DismissedLoaded(ids))
                }));
                smallvec![
                    load,
                    Effect::Cancel(FLASH_REFRESH),
                    Self::fetch_and_reschedule(env),
                ]
            },

            FlashBannerAction::Refresh => smallvec![Self::fetch_and_reschedule(env)],

            FlashBannerAction::DismissedLoaded(ids) => {
                state.dismissed.extend(ids);
                SmallVec::new()
            },

            FlashBannerAction::Fetched(Some(flashes)) => {
                state.flashes = flashes.into_iter().map(FlashItem::from).collect();
                state.loaded = true;
                state.attempted = true;
                tracing::debug!(
                    active = state.active(env.clock.now()).len(),
                    "Flashes refreshed"
                );
                SmallVec::new()
            },

            FlashBannerAction::Fetched(None) => {
                state.attempted = true;
                SmallVec::new()
            },

            FlashBannerAction::Dismiss(id) => {
                if !state.dismissed.insert(id) {
                    return SmallVec::new();
                }
                let store = Arc::clone(&env.dismissed);
                let ids = state.dismissed.clone();
                smallvec![Effect::Future(Box::pin(async move {
                    match store.merge(&ids) {
                        Ok(stored) => Some(FlashBannerAction::DismissedLoaded(stored)),
                        Err(error) => {
                            tracing::warn!(%error, key = DISMISSED_KEY, "Could not persist dismissed flashes");
                            None
                        },
                    }
                }))]
            },

            FlashBannerAction::Unmount => smallvec![Effect::Cancel(FLASH_REFRESH)],
        }
    }
}
