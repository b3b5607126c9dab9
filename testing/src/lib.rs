//! # RBE Testing
//!
//! Testing utilities and helpers for the site features.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - A Given-When-Then harness for reducers
//! - Effect inspection helpers
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use rbe_testing::{ReducerTest, test_clock};
//!
//! #[test]
//! fn submit_moves_to_processing() {
//!     ReducerTest::new(RegistrationReducer)
//!         .with_env(test_environment())
//!         .given_state(filled_form())
//!         .when_action(RegistrationAction::Submit)
//!         .then_state(|s| assert!(s.submitting))
//!         .run();
//! }
//! ```

use chrono::{DateTime, Utc};
use rbe_core::environment::Clock;


/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rbe_testing::mocks::FixedClock;
    /// use rbe_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// Create a fixed clock from an RFC 3339 timestamp
        ///
        /// # Panics
        ///
        /// Panics if the timestamp does not parse.
        #[must_use]
        #[allow(clippy::expect_used)]
        pub fn at(timestamp: &str) -> Self {
            Self::new(
                DateTime::parse_from_rfc3339(timestamp)
                    .expect("test timestamp should be RFC 3339")
                    .with_timezone(&Utc),
            )
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::at("2025-01-01T00:00:00Z")
    }
}

/// Effect inspection helpers
///
/// Reducers return nested effect trees (`Cancellable` around `Parallel` around
/// `Delay`). These helpers flatten the tree so tests can ask direct questions.
pub mod helpers {
    use rbe_core::effect::{Effect, EffectId};
    use std::time::Duration;

    /// Visit every effect in the tree, depth first
    pub fn walk<A>(effects: &[Effect<A>], visit: &mut impl FnMut(&Effect<A>)) {
        for effect in effects {
            visit(effect);
            match effect {
                Effect::Parallel(inner) | Effect::Sequential(inner) => walk(inner, visit),
                Effect::Cancellable { effect, .. } => {
                    walk(std::slice::from_ref(effect.as_ref()), visit);
                },
                _ => {},
            }
        }
    }

    /// Every delayed action with its delay
    #[must_use]
    pub fn delayed_actions<A: Clone>(effects: &[Effect<A>]) -> Vec<(Duration, A)> {
        let mut found = Vec::new();
        walk(effects, &mut |effect| {
            if let Effect::Delay { duration, action } = effect {
                found.push((*duration, action.as_ref().clone()));
            }
        });
        found
    }

    /// Ids of every `Cancellable` group in the tree
    #[must_use]
    pub fn cancellable_ids<A>(effects: &[Effect<A>]) -> Vec<EffectId> {
        let mut found = Vec::new();
        walk(effects, &mut |effect| {
            if let Effect::Cancellable { id, .. } = effect {
                found.push(*id);
            }
        });
        found
    }

    /// Ids cancelled by `Cancel` effects in the tree
    #[must_use]
    pub fn cancelled_ids<A>(effects: &[Effect<A>]) -> Vec<EffectId> {
        let mut found = Vec::new();
        walk(effects, &mut |effect| {
            if let Effect::Cancel(id) = effect {
                found.push(*id);
            }
        });
        found
    }

    /// Number of `Future` effects in the tree
    #[must_use]
    pub fn future_count<A>(effects: &[Effect<A>]) -> usize {
        let mut count = 0;
        walk(effects, &mut |effect| {
            if matches!(effect, Effect::Future(_)) {
                count += 1;
            }
        });
        count
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Plausible email addresses (always contain `@`)
    pub fn email() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9.]{0,12}", "[a-z]{2,10}", "(fr|com|org)")
            .prop_map(|(user, domain, tld)| format!("{user}@{domain}.{tld}"))
    }

    /// Person names with surrounding whitespace, never blank once trimmed
    pub fn padded_name() -> impl Strategy<Value = String> {
        (" {0,3}", "[A-Za-zéè][A-Za-zéè -]{0,20}[A-Za-zéè]", " {0,3}")
            .prop_map(|(before, name, after)| format!("{before}{name}{after}"))
    }

    /// Attendee counts inside the per-category limit of 10
    pub fn attendee_count() -> impl Strategy<Value = u32> {
        0u32..=10
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
