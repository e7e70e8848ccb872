//! Session store: the single source of truth for [`AuthState`].
//!
//! DESIGN
//! ======
//! `SessionStore` is a cheap `Clone` handle over one locked inner value,
//! the only writer path for auth state in the process. Two inputs race to
//! settle it: the one-shot startup probe and the provider's notification
//! channel. Both apply under the same lock, in arrival order. The probe
//! result may only settle the initial `Unknown`; once a notification has
//! determined the state, a late probe result is stale and discarded, so a
//! slow probe can never undo a sign-in that completed while it was in
//! flight.
//!
//! Each subscriber gets its own unbounded queue, so every transition is
//! delivered in apply order with no coalescing. Dropping a [`Subscription`]
//! unregisters it; dropping the last store handle closes all subscriber
//! channels, which readers observe as the end of the stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::identity::IdentityService;
use crate::session::{AuthEvent, AuthState};

// =============================================================================
// SESSION STORE
// =============================================================================

/// Process-wide holder of the current [`AuthState`].
///
/// Clones share the same state. Created once at process start, torn down
/// never during normal operation; tests reset by constructing a fresh one.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    state: AuthState,
    /// Set once `initialize` has claimed the startup probe.
    probed: bool,
    /// Live subscriber queues, pruned when a receiver goes away.
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<AuthState>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: AuthState::Unknown,
                probed: false,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// The present state snapshot. Never blocks on in-flight service calls.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.lock().state.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Probe the identity service for an existing session, exactly once per
    /// process. A found session settles `Authenticated`, none settles
    /// `Unauthenticated`, and a probe failure also settles
    /// `Unauthenticated`: an unauthenticated landing screen is always safe,
    /// a wrongly assumed login is not.
    ///
    /// If a notification event determines the state while the probe is in
    /// flight, the probe result is stale and discarded; see
    /// [`SessionStore::apply_event`] for the ordering contract.
    pub async fn initialize(&self, service: &dyn IdentityService) {
        {
            let mut inner = self.lock();
            if inner.probed {
                tracing::warn!("initialize called more than once; ignoring");
                return;
            }
            inner.probed = true;
        }

        let resolved = match service.probe_session().await {
            Ok(Some(session)) => AuthState::Authenticated(session),
            Ok(None) => AuthState::Unauthenticated,
            Err(e) => {
                tracing::warn!(error = %e, "session probe failed; treating as signed out");
                AuthState::Unauthenticated
            }
        };

        let mut inner = self.lock();
        if inner.state == AuthState::Unknown {
            inner.apply(resolved);
        } else {
            tracing::debug!(state = inner.state.name(), "discarding stale probe result");
        }
    }

    /// Apply a notification-channel event.
    ///
    /// Events always win over an in-flight probe: they are applied in
    /// arrival order under the store lock, and a probe result arriving
    /// later can no longer overwrite them. `SIGNED_IN`, `TOKEN_REFRESHED`
    /// and `USER_UPDATED` each carry a fresh session that replaces the
    /// previous one wholesale; `SIGNED_OUT` settles `Unauthenticated`.
    pub fn apply_event(&self, event: AuthEvent) {
        let next = match event {
            AuthEvent::SignedIn { session }
            | AuthEvent::TokenRefreshed { session }
            | AuthEvent::UserUpdated { session } => AuthState::Authenticated(session),
            AuthEvent::SignedOut => AuthState::Unauthenticated,
        };
        self.lock().apply(next);
    }

    /// Subscribe to state transitions. Every transition from this moment on
    /// is delivered in apply order, including the transition out of
    /// `Unknown`. The returned [`Subscription`] is the unsubscribe handle:
    /// dropping it releases the registration.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().subscribers.insert(id, tx);
        tracing::debug!(subscriber = %id, "auth subscription registered");
        Subscription { id, rx, store: Arc::downgrade(&self.inner) }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    /// Write `next` and fan out to every live subscriber. Every applied
    /// event notifies, even when the variant repeats: a refresh carries a
    /// fresh session payload.
    fn apply(&mut self, next: AuthState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "auth state transition");
        self.state = next;
        let state = self.state.clone();
        self.subscribers.retain(|_, tx| tx.send(state.clone()).is_ok());
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// A live registration on [`SessionStore`] transitions.
///
/// Dropping the subscription unregisters it, guaranteeing no further
/// delivery. Holds only a weak reference to the store, so an outstanding
/// subscription does not keep a torn-down store alive.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<AuthState>,
    store: Weak<Mutex<StoreInner>>,
}

impl Subscription {
    /// Await the next state transition. Returns `None` once the store side
    /// is gone and all queued transitions have been drained.
    pub async fn next(&mut self) -> Option<AuthState> {
        self.rx.recv().await
    }

    /// The next transition if one is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<AuthState> {
        self.rx.try_recv().ok()
    }

    /// Registration id, visible in store logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            let mut inner = inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.subscribers.remove(&self.id);
        }
    }
}

// =============================================================================
// EVENT PUMP
// =============================================================================

/// Spawn the task that forwards identity-service events into the store.
/// Returns a handle for shutdown; the task also exits on its own when the
/// sender side of the channel closes.
pub fn spawn_event_pump(store: SessionStore, mut events: mpsc::UnboundedReceiver<AuthEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(event = event.name(), "auth event received");
            store.apply_event(event);
        }
        tracing::debug!("auth event channel closed; pump exiting");
    })
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
