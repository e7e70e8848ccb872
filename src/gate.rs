//! Route gating: hold, render, or redirect a screen based on auth state.
//!
//! DESIGN
//! ======
//! Two gate policies share one capability, "which auth states may this
//! screen tolerate, and where does the user go otherwise". [`GateCore`] is
//! the per-mount state machine, pure and synchronous so every transition is
//! testable without a runtime; [`GateMount`] wires a core to a live store
//! subscription and performs redirects through the router. A redirect uses
//! replace semantics so back-navigation cannot land on the gated screen,
//! and fires at most once per mount; a fresh mount starts over at
//! `Pending`.

use std::sync::Arc;

use crate::router::{NavMode, Route, Router};
use crate::session::AuthState;
use crate::store::{SessionStore, Subscription};

// =============================================================================
// POLICIES
// =============================================================================

/// What a policy says about one auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not determinate yet; keep the neutral placeholder up.
    Hold,
    /// The screen may render.
    Allow,
    /// The screen must not render; redirect.
    Deny,
}

/// Gate capability: judge auth states and name the redirect target.
pub trait GatePolicy: Send + Sync {
    /// Judge one auth state.
    fn verdict(&self, state: &AuthState) -> Verdict;

    /// Where a denied screen sends the user.
    fn redirect_target(&self) -> &Route;
}

/// Gate for screens that need a signed-in user.
///
/// `Unknown` holds the placeholder (redirecting on `Unknown` would bounce a
/// legitimate session still being probed); `Unauthenticated` redirects to
/// the login route; `Authenticated` renders.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    redirect: Route,
}

impl RequireAuth {
    /// Gate redirecting to the default login route.
    #[must_use]
    pub fn new() -> Self {
        Self { redirect: Route::login() }
    }

    /// Gate redirecting to `target` instead.
    #[must_use]
    pub fn redirecting_to(target: Route) -> Self {
        Self { redirect: target }
    }
}

impl Default for RequireAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl GatePolicy for RequireAuth {
    fn verdict(&self, state: &AuthState) -> Verdict {
        match state {
            AuthState::Unknown => Verdict::Hold,
            AuthState::Authenticated(_) => Verdict::Allow,
            AuthState::Unauthenticated => Verdict::Deny,
        }
    }

    fn redirect_target(&self) -> &Route {
        &self.redirect
    }
}

/// Gate for public-only screens (login, register, the OAuth callback).
///
/// Symmetric to [`RequireAuth`]: once `Authenticated` the user is sent to
/// the home route; `Unauthenticated` renders; `Unknown` holds.
#[derive(Debug, Clone)]
pub struct RequireNoAuth {
    redirect: Route,
}

impl RequireNoAuth {
    /// Gate redirecting to the default home route.
    #[must_use]
    pub fn new() -> Self {
        Self { redirect: Route::home() }
    }

    /// Gate redirecting to `target` instead.
    #[must_use]
    pub fn redirecting_to(target: Route) -> Self {
        Self { redirect: target }
    }
}

impl Default for RequireNoAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl GatePolicy for RequireNoAuth {
    fn verdict(&self, state: &AuthState) -> Verdict {
        match state {
            AuthState::Unknown => Verdict::Hold,
            AuthState::Authenticated(_) => Verdict::Deny,
            AuthState::Unauthenticated => Verdict::Allow,
        }
    }

    fn redirect_target(&self) -> &Route {
        &self.redirect
    }
}

// =============================================================================
// GATE CORE
// =============================================================================

/// Lifecycle phase of one gated mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatePhase {
    /// No determinate auth state seen yet; the placeholder is up.
    #[default]
    Pending,
    /// The wrapped screen is rendered.
    Rendering,
    /// A redirect fired. Terminal for this mount.
    Redirecting,
}

/// Instruction for the host after one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDirective {
    /// Keep the neutral placeholder up.
    Wait,
    /// Render (or keep rendering) the wrapped screen.
    Render,
    /// Navigate to the contained route, replacing the history entry.
    Redirect(Route),
}

/// Per-mount gate state machine, independent of any runtime.
///
/// Feed it every observed [`AuthState`]; it returns what the host should
/// do. `Redirect` is produced at most once per mount; every observation
/// after it is a no-op. Re-observing the same state is harmless, which
/// makes seeding from a snapshot next to a live subscription safe.
pub struct GateCore<P> {
    policy: P,
    phase: GatePhase,
}

impl<P: GatePolicy> GateCore<P> {
    #[must_use]
    pub fn new(policy: P) -> Self {
        Self { policy, phase: GatePhase::Pending }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Observe one auth state and step the machine.
    pub fn observe(&mut self, state: &AuthState) -> GateDirective {
        if self.phase == GatePhase::Redirecting {
            return GateDirective::Wait;
        }
        match self.policy.verdict(state) {
            // The store never regresses to Unknown; a Hold observed after
            // the screen rendered keeps it up.
            Verdict::Hold => match self.phase {
                GatePhase::Pending => GateDirective::Wait,
                _ => GateDirective::Render,
            },
            Verdict::Allow => {
                self.phase = GatePhase::Rendering;
                GateDirective::Render
            }
            Verdict::Deny => {
                self.phase = GatePhase::Redirecting;
                GateDirective::Redirect(self.policy.redirect_target().clone())
            }
        }
    }
}

// =============================================================================
// GATE MOUNT
// =============================================================================

/// A gate wired to the live store and router.
///
/// Subscribes first, then seeds from the current snapshot so no transition
/// between the two is missed (one observed twice is harmless). Consumes
/// transitions until the redirect fires or the store goes away; dropping
/// the mount releases its subscription.
pub struct GateMount<P: GatePolicy> {
    core: GateCore<P>,
    router: Arc<dyn Router>,
    sub: Subscription,
}

impl<P: GatePolicy> GateMount<P> {
    #[must_use]
    pub fn new(store: &SessionStore, router: Arc<dyn Router>, policy: P) -> Self {
        let sub = store.subscribe();
        let mut mount = Self { core: GateCore::new(policy), router, sub };
        let directive = mount.core.observe(&store.current());
        mount.act(&directive);
        mount
    }

    /// Current lifecycle phase; what the host renders on.
    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.core.phase()
    }

    /// Wait for the next transition and step the gate, acting on the
    /// directive. Returns `None` once the store side is gone, after
    /// applying the fail-safe (treat an indeterminate signal as signed
    /// out, never as signed in).
    pub async fn tick(&mut self) -> Option<GateDirective> {
        match self.sub.next().await {
            Some(state) => {
                let directive = self.core.observe(&state);
                self.act(&directive);
                Some(directive)
            }
            None => {
                tracing::debug!("auth subscription lost; failing safe to signed out");
                let directive = self.core.observe(&AuthState::Unauthenticated);
                self.act(&directive);
                None
            }
        }
    }

    /// Drive the gate until its redirect fires or the store goes away.
    pub async fn run(&mut self) {
        while self.core.phase() != GatePhase::Redirecting {
            if self.tick().await.is_none() {
                break;
            }
        }
    }

    fn act(&self, directive: &GateDirective) {
        if let GateDirective::Redirect(route) = directive {
            tracing::info!(route = %route, "gate redirecting");
            self.router.navigate(route, NavMode::Replace);
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
