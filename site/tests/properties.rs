//! Properties that hold for every input
//!
//! Form validation happens before any request, and totals follow the price
//! formula.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use rbe_core::reducer::Reducer;
use rbe_site::api::mock::MockSiteApi;
use rbe_site::events::{EventExtras, FallbackQuery, demo_events};
use rbe_site::newsletter::{
    NewsletterAction, NewsletterEnvironment, NewsletterReducer, NewsletterState, SignupStatus,
};
use rbe_site::registration::{
    LogRedirector, RegistrationAction, RegistrationEnvironment, RegistrationForm,
    RegistrationReducer, RegistrationSettings, RegistrationState, Step, total,
};
use rbe_site::{DataSource, Event, Money, NewsletterError, RegistrationError};
use rbe_testing::{helpers, properties, test_clock};
use std::sync::Arc;

fn halloween() -> Event {
    demo_events().remove(0)
}

fn registration_env(api: &Arc<MockSiteApi>) -> RegistrationEnvironment {
    RegistrationEnvironment::new(
        api.clone(),
        Arc::new(LogRedirector),
        Arc::new(test_clock()),
        RegistrationSettings::default(),
    )
}

fn form_state(form: RegistrationForm) -> RegistrationState {
    let mut state = RegistrationState::new("halloween2025", FallbackQuery::default());
    state.event = Some(halloween());
    state.source = Some(DataSource::Live);
    state.step = Step::Form;
    state.form = form;
    state
}

/// Strings that never contain `@`
fn email_without_at() -> impl Strategy<Value = String> {
    "[a-z0-9. _-]{0,24}"
}

proptest! {
    #[test]
    fn zero_tickets_never_reach_the_api(name in properties::padded_name(), email in properties::email()) {
        let api = MockSiteApi::new().shared();
        let env = registration_env(&api);
        let mut state = form_state(RegistrationForm {
            participant_name: name,
            participant_email: email,
            adult_tickets: 0,
            child_tickets: 0,
        });

        let effects = RegistrationReducer.reduce(&mut state, RegistrationAction::Submit, &env);

        prop_assert!(effects.is_empty());
        prop_assert_eq!(state.error, Some(RegistrationError::NoTickets));
        prop_assert!(!state.submitting);
        prop_assert!(api.requests().is_empty());
    }

    #[test]
    fn registration_rejects_emails_without_at(
        name in properties::padded_name(),
        email in email_without_at(),
        adults in 1u32..=10,
    ) {
        let api = MockSiteApi::new().shared();
        let env = registration_env(&api);
        let mut state = form_state(RegistrationForm {
            participant_name: name,
            participant_email: email,
            adult_tickets: adults,
            child_tickets: 0,
        });

        let effects = RegistrationReducer.reduce(&mut state, RegistrationAction::Submit, &env);

        prop_assert!(effects.is_empty());
        prop_assert_eq!(state.error, Some(RegistrationError::InvalidEmail));
    }

    #[test]
    fn newsletter_rejects_emails_without_at(email in email_without_at()) {
        let env = NewsletterEnvironment::new(Arc::new(MockSiteApi::new()));
        let mut state = NewsletterState { email, ..NewsletterState::default() };

        let effects = NewsletterReducer.reduce(&mut state, NewsletterAction::Submit, &env);

        prop_assert_eq!(helpers::future_count(&effects), 0);
        prop_assert!(!state.submitting);
        prop_assert_eq!(
            state.status,
            Some(SignupStatus::Error(NewsletterError::InvalidEmail))
        );
    }

    #[test]
    fn valid_forms_submit_exactly_once(
        name in properties::padded_name(),
        email in properties::email(),
        adults in properties::attendee_count(),
        children in 1u32..=10,
    ) {
        let api = MockSiteApi::new().shared();
        let env = registration_env(&api);
        let mut state = form_state(RegistrationForm {
            participant_name: name,
            participant_email: email,
            adult_tickets: adults,
            child_tickets: children,
        });

        let first = RegistrationReducer.reduce(&mut state, RegistrationAction::Submit, &env);
        let second = RegistrationReducer.reduce(&mut state, RegistrationAction::Submit, &env);

        prop_assert_eq!(helpers::future_count(&first), 1);
        prop_assert!(second.is_empty());
        prop_assert!(state.error.is_none());
    }

    #[test]
    fn total_follows_price_formula(
        adult_cents in 0u64..100_000,
        child_cents in 0u64..100_000,
        adults in properties::attendee_count(),
        children in properties::attendee_count(),
    ) {
        let mut event = halloween();
        event.adult_price = Some(Money::from_cents(adult_cents));
        event.child_price = Some(Money::from_cents(child_cents));

        prop_assert_eq!(
            total(&event, adults, children),
            Money::from_cents(adult_cents * u64::from(adults) + child_cents * u64::from(children))
        );
    }

    #[test]
    fn free_events_total_zero(
        adult_cents in 0u64..100_000,
        adults in properties::attendee_count(),
        children in properties::attendee_count(),
    ) {
        let mut event = halloween();
        event.adult_price = Some(Money::from_cents(adult_cents));
        event.extras = EventExtras { is_free: true, ..event.extras };

        prop_assert_eq!(total(&event, adults, children), Money::ZERO);
    }
}

#[test]
fn halloween_scenario_totals_38() {
    assert_eq!(total(&halloween(), 2, 1), Money::from_euros(38));
    assert_eq!(total(&halloween(), 2, 1).to_string(), "38€");
}
