//! # RBE Runtime
//!
//! Runtime for the site features.
//!
//! This crate provides the Store that coordinates reducer execution and effect
//! handling. One Store backs one mounted view of the site.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Cancellation Registry**: Aborts recurring work (status polls, banner refreshes)
//!   when a reducer asks for it or when the view is torn down
//!
//! ## Example
//!
//! ```ignore
//! use rbe_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::Load).await?;
//!
//! // Read state
//! let step = store.state(|s| s.step.clone()).await;
//!
//! // Navigating away: stop every recurring effect
//! store.teardown();
//! ```

use rbe_core::{
    effect::{Effect, EffectId},
    reducer::Reducer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, watch};
use tokio::task::AbortHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// The view was torn down and no longer accepts actions
        #[error("Store is torn down")]
        TornDown,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects started by
/// that action. Effects registered under a cancellation group complete when
/// they finish or when the group is cancelled.
///
/// # Example
///
/// ```ignore
/// store.send(Action::Load).await?.wait().await;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new(scope: Option<EffectId>) -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
            scope,
        };

        (handle, tracking)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    /// Cancellation group inherited from an enclosing `Effect::Cancellable`
    scope: Option<EffectId>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }

    fn scoped(&self, id: EffectId) -> Self {
        Self {
            scope: Some(id),
            ..self.clone()
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Runs when the task finishes, panics, or is aborted by cancellation.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Running tasks per cancellation group
#[derive(Default)]
struct CancellationRegistry {
    groups: Mutex<HashMap<EffectId, Vec<AbortHandle>>>,
}

impl CancellationRegistry {
    /// Spawn `task`, registering it under `scope` while the registry lock is held
    /// so that a concurrent `cancel` cannot miss it.
    fn spawn<F>(&self, scope: Option<EffectId>, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let Some(id) = scope else {
            tokio::spawn(task);
            return;
        };

        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(task);
        let group = groups.entry(id).or_default();
        group.retain(|h| !h.is_finished());
        group.push(handle.abort_handle());
    }

    fn cancel(&self, id: EffectId) -> usize {
        let handles = self
            .groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .unwrap_or_default();

        abort_all(&handles)
    }

    fn cancel_all(&self) -> usize {
        let groups: Vec<_> = self
            .groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        groups.iter().map(|(_, handles)| abort_all(handles)).sum()
    }

    fn running(&self, id: EffectId) -> usize {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map_or(0, |handles| handles.iter().filter(|h| !h.is_finished()).count())
    }
}

fn abort_all(handles: &[AbortHandle]) -> usize {
    let mut aborted = 0;
    for handle in handles.iter().filter(|h| !h.is_finished()) {
        handle.abort();
        aborted += 1;
    }
    aborted
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, CancellationRegistry, DecrementGuard, Effect, EffectHandle, EffectId,
        EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (feature logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Cancellation of recurring effects
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        torn_down: Arc<AtomicBool>,
        cancellations: Arc<CancellationRegistry>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Mount a view: initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                torn_down: Arc::new(AtomicBool::new(false)),
                cancellations: Arc::new(CancellationRegistry::default()),
            }
        }

        /// Tear the view down
        ///
        /// Rejects further actions and aborts every effect registered under a
        /// cancellation group. Effects outside any group run to completion but
        /// their resulting actions are dropped.
        ///
        /// Returns the number of aborted tasks.
        pub fn teardown(&self) -> usize {
            self.torn_down.store(true, Ordering::Release);
            let aborted = self.cancellations.cancel_all();
            metrics::counter!("store.effects.cancelled").increment(aborted as u64);
            tracing::debug!(aborted, "Store torn down");
            aborted
        }

        /// Abort every running effect of one cancellation group
        ///
        /// Returns the number of aborted tasks.
        pub fn cancel(&self, id: EffectId) -> usize {
            let aborted = self.cancellations.cancel(id);
            metrics::counter!("store.effects.cancelled").increment(aborted as u64);
            tracing::debug!(%id, aborted, "Cancelled effect group");
            aborted
        }

        /// Number of tasks still running under a cancellation group
        #[must_use]
        pub fn running_effects(&self, id: EffectId) -> usize {
            self.cancellations.running(id)
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Executes returned effects asynchronously
        /// 4. Effects may produce more actions (feedback loop)
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::TornDown`] after [`Store::teardown`].
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.torn_down.load(Ordering::Acquire) {
                tracing::debug!("Rejected action: store is torn down");
                return Err(StoreError::TornDown);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new(None);

            let effects = {
                let mut state = self.state.write().await;
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect_internal(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let loading = store.state(|s| s.loading).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Feed an action produced by an effect back into the store
        async fn feed_back(&self, action: A)
        where
            R: Clone,
            E: Clone,
        {
            if let Err(error) = self.send(action).await {
                tracing::debug!(%error, "Dropped action produced by effect");
            }
        }

        /// Spawn an effect task, tracked for completion
        fn spawn_tracked<F>(&self, tracking: &EffectTracking, task: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            let guard = DecrementGuard(tracking.clone());

            self.cancellations.spawn(tracking.scope, async move {
                let _guard = guard;
                task.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Delay`: Waits for duration, then sends action
        /// - `Parallel`: Executes effects concurrently
        /// - `Sequential`: Executes effects in order, waiting for each to complete
        /// - `Cancellable`: Executes the inner effect inside a cancellation group
        /// - `Cancel`: Aborts a cancellation group
        ///
        /// Effect failures never halt the store: a panicking task is isolated in its
        /// own tokio task and the [`DecrementGuard`] keeps the counters right.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into tasks
        fn execute_effect_internal(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();

                    self.spawn_tracked(&tracking, async move {
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let store = self.clone();

                    self.spawn_tracked(&tracking, async move {
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    for effect in effects {
                        self.execute_effect_internal(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    let effect_count = effects.len();
                    tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                    metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                    let store = self.clone();
                    let scope = tracking.scope;

                    self.spawn_tracked(&tracking, async move {
                        for effect in effects {
                            let (mut sub_handle, sub_tracking) = EffectHandle::new(scope);
                            store.execute_effect_internal(effect, sub_tracking);
                            sub_handle.wait().await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
                Effect::Cancellable { id, effect } => {
                    tracing::trace!(%id, "Executing Effect::Cancellable");
                    self.execute_effect_internal(*effect, tracking.scoped(id));
                },
                Effect::Cancel(id) => {
                    self.cancel(id);
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                torn_down: Arc::clone(&self.torn_down),
                cancellations: Arc::clone(&self.cancellations),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use rbe_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
    use std::time::Duration;

    const TICK: EffectId = EffectId::new("tick");

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
    }

    #[derive(Debug, Clone)]
    enum TestAction {
        Increment,
        ProduceEffect,
        ProduceDelayedAction,
        ProduceSequentialEffects,
        StartTicking,
        Tick,
        StopTicking,
    }

    #[derive(Debug, Clone)]
    struct TestEnv;

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                TestAction::ProduceEffect => {
                    smallvec![Effect::Future(Box::pin(async { Some(TestAction::Increment) }))]
                },
                TestAction::ProduceDelayedAction => {
                    smallvec![Effect::delay(Duration::from_millis(10), TestAction::Increment)]
                },
                TestAction::ProduceSequentialEffects => smallvec![Effect::chain(vec![
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                    Effect::delay(Duration::from_millis(5), TestAction::Increment),
                ])],
                TestAction::StartTicking => {
                    smallvec![Effect::delay(Duration::from_secs(1), TestAction::Tick).cancellable(TICK)]
                },
                TestAction::Tick => {
                    state.value += 1;
                    smallvec![Effect::delay(Duration::from_secs(1), TestAction::Tick).cancellable(TICK)]
                },
                TestAction::StopTicking => smallvec![Effect::Cancel(TICK)],
            }
        }
    }

    fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv)
    }

    #[tokio::test]
    async fn test_send_action() {
        let store = store();

        let _ = store.send(TestAction::Increment).await;
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effect_future_feeds_back() -> Result<(), StoreError> {
        let store = store();

        store.send(TestAction::ProduceEffect).await?.wait().await;

        assert_eq!(store.state(|s| s.value).await, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_effect_delay() -> Result<(), StoreError> {
        let store = store();

        let mut handle = store.send(TestAction::ProduceDelayedAction).await?;
        assert_eq!(store.state(|s| s.value).await, 0);

        handle.wait().await;
        assert_eq!(store.state(|s| s.value).await, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_effect_sequential() -> Result<(), StoreError> {
        let store = store();

        store.send(TestAction::ProduceSequentialEffects).await?.wait().await;

        assert_eq!(store.state(|s| s.value).await, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_recurring_effect() -> Result<(), StoreError> {
        let store = store();

        store.send(TestAction::StartTicking).await?;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(store.state(|s| s.value).await, 3);

        store.send(TestAction::StopTicking).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(store.state(|s| s.value).await, 3);
        assert_eq!(store.running_effects(TICK), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_aborts_and_rejects() -> Result<(), StoreError> {
        let store = store();

        store.send(TestAction::StartTicking).await?;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.running_effects(TICK), 1);

        assert_eq!(store.teardown(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.state(|s| s.value).await, 1);
        assert!(matches!(
            store.send(TestAction::Increment).await,
            Err(StoreError::TornDown)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_effect_result_after_teardown_is_dropped() -> Result<(), StoreError> {
        let store = store();

        let mut handle = store.send(TestAction::ProduceEffect).await?;
        store.teardown();
        handle.wait().await;

        assert_eq!(store.state(|s| s.value).await, 0);
        Ok(())
    }
}
