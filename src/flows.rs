//! Module: user-facing authentication flows.
//!
//! DESIGN
//! ======
//! [`AuthFlows`] is the surface the login and register screens call into.
//! Every flow validates its inputs before touching the network, so a blank
//! form never costs a round-trip. Password sign-in, registration, and
//! sign-out share a single-flight guard: while one of them is in flight,
//! further attempts fail fast with [`AuthError::Busy`] instead of queueing.
//! OAuth initiation is exempt because it only opens the provider redirect;
//! the session, if the user completes it, arrives later as a `SIGNED_IN`
//! notification. Flows never write session state themselves. The
//! [`crate::store::SessionStore`] learns about outcomes exclusively through
//! the event channel, which keeps screen code and state transitions from
//! racing each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tracing::{info, warn};

use crate::identity::{IdentityService, OAuthProvider, ServiceError, SignUpOutcome};

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Input problems caught before any service call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One or more required fields were left empty.
    #[error("all fields are required")]
    MissingFields,
    /// The password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,
}

/// Everything a flow can fail with, shaped for direct display to the user.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The form was rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The email/password pair was rejected by the provider.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// An account with this email already exists.
    #[error("email already in use")]
    EmailInUse,
    /// The provider rejected the password as too weak.
    #[error("password is too weak")]
    WeakPassword,
    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The OAuth redirect could not be initiated.
    #[error("oauth provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Another guarded flow is already in flight.
    #[error("another auth request is already in flight")]
    Busy,
    /// The provider reported something with no dedicated variant.
    #[error("auth error: {0}")]
    Unknown(String),
}

impl From<ServiceError> for AuthError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => Self::InvalidCredentials,
            ServiceError::EmailInUse => Self::EmailInUse,
            ServiceError::WeakPassword => Self::WeakPassword,
            ServiceError::Network(detail) => Self::Network(detail),
            ServiceError::ProviderUnavailable(detail) => Self::ProviderUnavailable(detail),
            ServiceError::Other(detail) => Self::Unknown(detail),
        }
    }
}

// =============================================================================
// REGISTER OUTCOME
// =============================================================================

/// What a successful registration produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The provider issued a session right away; `SIGNED_IN` is on its way
    /// through the notification channel.
    SessionEstablished,
    /// The account exists but needs email verification before sign-in.
    VerificationPending,
}

// =============================================================================
// AUTH FLOWS
// =============================================================================

/// User-facing flows over an [`IdentityService`].
///
/// Cheap to clone; clones share the single-flight guard.
#[derive(Clone)]
pub struct AuthFlows {
    service: Arc<dyn IdentityService>,
    in_flight: Arc<AtomicBool>,
}

impl AuthFlows {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service, in_flight: Arc::new(AtomicBool::new(false)) }
    }

    /// Sign in with an email/password pair. The resulting session reaches
    /// the store through the notification channel, not this return value.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingFields`] when either field is empty,
    /// [`AuthError::Busy`] while another guarded flow runs, otherwise the
    /// mapped service failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        let _guard = self.begin()?;

        info!(email, "password sign-in requested");
        match self.service.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(user_id = %session.user_id, "signed in");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "sign-in failed");
                Err(err.into())
            }
        }
    }

    /// Create an account. `full_name` is forwarded to the provider as
    /// profile metadata.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingFields`] when any field is empty,
    /// [`ValidationError::PasswordMismatch`] when the confirmation differs,
    /// [`AuthError::Busy`] while another guarded flow runs, otherwise the
    /// mapped service failure.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<RegisterOutcome, AuthError> {
        if full_name.is_empty() || email.is_empty() || password.is_empty() || confirm_password.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        if password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }
        let _guard = self.begin()?;

        info!(email, "registration requested");
        let metadata = json!({ "full_name": full_name });
        match self.service.sign_up(email, password, metadata).await {
            Ok(SignUpOutcome::Session(session)) => {
                info!(user_id = %session.user_id, "registered with immediate session");
                Ok(RegisterOutcome::SessionEstablished)
            }
            Ok(SignUpOutcome::VerificationPending) => {
                info!(email, "registered; awaiting email verification");
                Ok(RegisterOutcome::VerificationPending)
            }
            Err(err) => {
                warn!(error = %err, "registration failed");
                Err(err.into())
            }
        }
    }

    /// Kick off the redirect-based OAuth flow for `provider`. Success means
    /// the redirect was initiated; whether a session follows depends on the
    /// user finishing authorization, which lands as a `SIGNED_IN` event.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProviderUnavailable`] when the redirect could not be
    /// initiated.
    pub async fn initiate_oauth(&self, provider: OAuthProvider, redirect_target: &str) -> Result<(), AuthError> {
        info!(%provider, "oauth sign-in initiated");
        match self.service.sign_in_with_oauth(provider, redirect_target).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(%provider, error = %err, "oauth initiation failed");
                Err(err.into())
            }
        }
    }

    /// End the current session. Succeeds even when the network revoke
    /// fails, since the service clears local state and emits `SIGNED_OUT`
    /// regardless.
    ///
    /// # Errors
    ///
    /// [`AuthError::Busy`] while another guarded flow runs, or the mapped
    /// service failure for non-network errors.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _guard = self.begin()?;

        match self.service.sign_out().await {
            Ok(()) => {
                info!("signed out");
                Ok(())
            }
            Err(ServiceError::Network(detail)) => {
                // The session is already gone locally; the user is signed
                // out whether or not the server heard about it.
                warn!(error = %detail, "sign-out revoke failed, local session cleared anyway");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "sign-out failed");
                Err(err.into())
            }
        }
    }

    fn begin(&self) -> Result<FlightGuard, AuthError> {
        FlightGuard::acquire(&self.in_flight).ok_or(AuthError::Busy)
    }
}

/// Releases the single-flight slot on drop, including on early `?` returns.
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "flows_test.rs"]
mod tests;
