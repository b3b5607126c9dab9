//! Newsletter signup and subscriber management
//!
//! The footer signup form is a small reducer: validate, post, show a status
//! line that clears itself after a few seconds. Subscriber management is a
//! plain service over the API.

use crate::api::{Loaded, SiteApi};
use crate::error::{NewsletterError, is_plausible_email};
use rbe_client::{SubscribeResponse, Subscriber};
use rbe_core::{
    SmallVec,
    effect::{Effect, EffectId},
    reducer::Reducer,
    smallvec,
};
use std::sync::Arc;
use std::time::Duration;

/// Cancellation group of the status-clearing timer
pub const NEWSLETTER_STATUS: EffectId = EffectId::new("newsletter.status");

/// How long a success message stays visible
pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(3);

/// How long an error message stays visible
pub const ERROR_DISPLAY: Duration = Duration::from_secs(4);

// ============================================================================
// Signup
// ============================================================================

/// Status line under the signup field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupStatus {
    /// Subscribed (`duplicated` when the address was already known)
    Subscribed {
        /// Address already on the list
        duplicated: bool,
    },
    /// Signup failed
    Error(NewsletterError),
}

impl SignupStatus {
    /// Text shown to the visitor
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Subscribed { duplicated: false } => "Thanks for subscribing!".to_string(),
            Self::Subscribed { duplicated: true } => "You are already subscribed.".to_string(),
            Self::Error(error) => error.to_string(),
        }
    }

    /// Whether the status reads as a success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Subscribed { .. })
    }
}

/// Signup form state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsletterState {
    /// Typed address
    pub email: String,
    /// A request is in flight
    pub submitting: bool,
    /// Status line, if any
    pub status: Option<SignupStatus>,
}

/// Signup form actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsletterAction {
    /// Address typed
    EmailChanged(String),
    /// Form submitted
    Submit,
    /// Request finished
    Completed(Result<SubscribeResponse, NewsletterError>),
    /// Status display time elapsed
    ClearStatus,
}

/// Signup form dependencies
#[derive(Clone)]
pub struct NewsletterEnvironment {
    /// Content API
    pub api: Arc<dyn SiteApi>,
}

impl NewsletterEnvironment {
    /// Creates a new `NewsletterEnvironment`
    #[must_use]
    pub fn new(api: Arc<dyn SiteApi>) -> Self {
        Self { api }
    }
}

/// Signup form reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct NewsletterReducer;

impl NewsletterReducer {
    fn show(
        state: &mut NewsletterState,
        status: SignupStatus,
    ) -> SmallVec<[Effect<NewsletterAction>; 4]> {
        let display = if status.is_success() {
            SUCCESS_DISPLAY
        } else {
            ERROR_DISPLAY
        };
        state.status = Some(status);

        // Restart the timer so an old one cannot clear the new message
        smallvec![
            Effect::Cancel(NEWSLETTER_STATUS),
            Effect::delay(display, NewsletterAction::ClearStatus).cancellable(NEWSLETTER_STATUS),
        ]
    }
}

impl Reducer for NewsletterReducer {
    type State = NewsletterState;
    type Action = NewsletterAction;
    type Environment = NewsletterEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            NewsletterAction::EmailChanged(email) => {
                state.email = email;
                SmallVec::new()
            },

            NewsletterAction::Submit => {
                if state.submitting {
                    return SmallVec::new();
                }
                if !is_plausible_email(&state.email) {
                    return Self::show(state, SignupStatus::Error(NewsletterError::InvalidEmail));
                }

                state.submitting = true;
                let api = Arc::clone(&env.api);
                let email = state.email.trim().to_string();

                smallvec![Effect::Future(Box::pin(async move {
                    let result = api
                        .subscribe(&email)
                        .await
                        .map_err(|e| NewsletterError::Api(e.to_string()));
                    Some(NewsletterAction::Completed(result))
                }))]
            },

            NewsletterAction::Completed(result) => {
                state.submitting = false;
                match result {
                    Ok(response) => {
                        tracing::info!(duplicated = response.duplicated, "Newsletter signup");
                        state.email.clear();
                        Self::show(
                            state,
                            SignupStatus::Subscribed {
                                duplicated: response.duplicated,
                            },
                        )
                    },
                    Err(error) => {
                        tracing::warn!(%error, "Newsletter signup failed");
                        Self::show(state, SignupStatus::Error(error))
                    },
                }
            },

            NewsletterAction::ClearStatus => {
                state.status = None;
                SmallVec::new()
            },
        }
    }
}

// ============================================================================
// Subscriber management
// ============================================================================

/// Subscribers shown when the API cannot be reached
#[must_use]
pub fn demo_subscribers() -> Vec<Subscriber> {
    vec![
        Subscriber {
            id: "demo1".to_string(),
            email: "demo@example.com".to_string(),
            status: Some("CONFIRMED".to_string()),
            created_at: None,
        },
        Subscriber {
            id: "demo2".to_string(),
            email: "test@rbe.fr".to_string(),
            status: Some("PENDING".to_string()),
            created_at: None,
        },
    ]
}

/// Subscriber list management
#[derive(Clone)]
pub struct SubscriberAdmin {
    api: Arc<dyn SiteApi>,
}

impl SubscriberAdmin {
    /// Creates a new `SubscriberAdmin`
    #[must_use]
    pub fn new(api: Arc<dyn SiteApi>) -> Self {
        Self { api }
    }

    /// Current subscribers, or the demo list when the API fails
    pub async fn list(&self) -> Loaded<Vec<Subscriber>> {
        match self.api.list_subscribers().await {
            Ok(subscribers) => Loaded::live(subscribers),
            Err(error) => {
                tracing::warn!(%error, "Subscriber list unavailable, showing demo data");
                Loaded::fallback(demo_subscribers())
            },
        }
    }

    /// Add an address
    ///
    /// # Errors
    ///
    /// [`NewsletterError::InvalidEmail`] without calling the API, or
    /// [`NewsletterError::Api`] when the call fails.
    pub async fn add(&self, email: &str) -> Result<(), NewsletterError> {
        if !is_plausible_email(email) {
            return Err(NewsletterError::InvalidEmail);
        }
        self.api
            .add_subscriber(email.trim())
            .await
            .map_err(|e| NewsletterError::Api(e.to_string()))?;
        tracing::info!("Subscriber added");
        Ok(())
    }

    /// Remove a subscriber
    ///
    /// # Errors
    ///
    /// [`NewsletterError::Api`] when the call fails.
    pub async fn delete(&self, id: &str) -> Result<(), NewsletterError> {
        self.api
            .delete_subscriber(id)
            .await
            .map_err(|e| NewsletterError::Api(e.to_string()))?;
        tracing::info!(subscriber_id = id, "Subscriber removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::api::mock::MockSiteApi;
    use rbe_testing::{ReducerTest, assertions, helpers};

    fn env() -> NewsletterEnvironment {
        NewsletterEnvironment::new(Arc::new(MockSiteApi::new()))
    }

    fn typed(email: &str) -> NewsletterState {
        NewsletterState {
            email: email.to_string(),
            ..NewsletterState::default()
        }
    }

    #[test]
    fn email_without_at_is_rejected_locally() {
        ReducerTest::new(NewsletterReducer)
            .with_env(env())
            .given_state(typed("membre.rbe.fr"))
            .when_action(NewsletterAction::Submit)
            .then_state(|s| {
                assert!(!s.submitting);
                assert_eq!(
                    s.status,
                    Some(SignupStatus::Error(NewsletterError::InvalidEmail))
                );
            })
            .then_effects(|effects| {
                assert_eq!(helpers::future_count(effects), 0);
                assert_eq!(
                    helpers::delayed_actions(effects),
                    vec![(ERROR_DISPLAY, NewsletterAction::ClearStatus)]
                );
            })
            .run();
    }

    #[test]
    fn valid_email_is_posted() {
        ReducerTest::new(NewsletterReducer)
            .with_env(env())
            .given_state(typed(" membre@rbe.fr "))
            .when_action(NewsletterAction::Submit)
            .then_state(|s| assert!(s.submitting))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn duplicated_subscription_reads_as_success() {
        let mut state = typed("membre@rbe.fr");
        state.submitting = true;

        ReducerTest::new(NewsletterReducer)
            .with_env(env())
            .given_state(state)
            .when_action(NewsletterAction::Completed(Ok(SubscribeResponse {
                duplicated: true,
            })))
            .then_state(|s| {
                let status = s.status.clone().unwrap();
                assert!(status.is_success());
                assert_eq!(status.message(), "You are already subscribed.");
                assert!(s.email.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_cancels(effects, NEWSLETTER_STATUS);
                assert_eq!(
                    helpers::delayed_actions(effects),
                    vec![(SUCCESS_DISPLAY, NewsletterAction::ClearStatus)]
                );
            })
            .run();
    }

    #[test]
    fn api_failure_keeps_typed_address() {
        let mut state = typed("membre@rbe.fr");
        state.submitting = true;

        ReducerTest::new(NewsletterReducer)
            .with_env(env())
            .given_state(state)
            .when_action(NewsletterAction::Completed(Err(NewsletterError::Api(
                "API error (status 500): boom".into(),
            ))))
            .then_state(|s| {
                assert!(!s.status.as_ref().unwrap().is_success());
                assert_eq!(s.email, "membre@rbe.fr");
            })
            .run();
    }

    #[test]
    fn clear_status_removes_message() {
        let mut state = typed("");
        state.status = Some(SignupStatus::Subscribed { duplicated: false });

        ReducerTest::new(NewsletterReducer)
            .with_env(env())
            .given_state(state)
            .when_action(NewsletterAction::ClearStatus)
            .then_state(|s| assert!(s.status.is_none()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn admin_list_falls_back_to_demo() {
        let admin = SubscriberAdmin::new(Arc::new(MockSiteApi::new()));
        let loaded = admin.list().await;

        assert!(loaded.is_fallback());
        assert_eq!(loaded.value[0].email, "demo@example.com");
        assert_eq!(loaded.value[1].status.as_deref(), Some("PENDING"));
    }

    #[tokio::test]
    async fn admin_add_and_delete() {
        let api = Arc::new(MockSiteApi::new().with_subscribers(vec![]));
        let admin = SubscriberAdmin::new(api.clone());

        assert_eq!(admin.add("nope").await, Err(NewsletterError::InvalidEmail));
        assert_eq!(api.count("POST /newsletter"), 0);

        admin.add(" membre@rbe.fr ").await.unwrap();
        let listed = admin.list().await;
        assert!(!listed.is_fallback());
        assert_eq!(listed.value[0].email, "membre@rbe.fr");

        admin.delete(&listed.value[0].id).await.unwrap();
        assert!(admin.list().await.value.is_empty());
        assert!(matches!(admin.delete("42").await, Err(NewsletterError::Api(_))));
    }
}
