//! Identity service capability: the narrow contract the auth core consumes.
//!
//! DESIGN
//! ======
//! Everything that talks to the identity backend goes through
//! [`IdentityService`], an object-safe async trait. Flows and the store hold
//! `Arc<dyn IdentityService>`, which keeps them testable against a scripted
//! mock and keeps the provider protocol (see [`crate::supabase`]) swappable.
//! Live session changes are deliberately not trait methods: implementations
//! push [`crate::session::AuthEvent`]s through an unbounded channel that the
//! embedding app wires to the store with [`crate::store::spawn_event_pump`].

use serde_json::Value;

use crate::session::Session;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Failures surfaced by identity-service implementations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The email/password pair was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The email is already registered.
    #[error("email already in use")]
    EmailInUse,
    /// The provider rejected the password as too weak.
    #[error("password rejected as too weak")]
    WeakPassword,
    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The OAuth redirect could not be initiated.
    #[error("oauth provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Anything the provider reported that has no dedicated variant.
    #[error("identity service error: {0}")]
    Other(String),
}

// =============================================================================
// OAUTH PROVIDERS
// =============================================================================

/// External OAuth providers the app offers sign-in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Twitter,
    Github,
}

impl OAuthProvider {
    /// Wire name expected by the provider's authorize endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Twitter => "twitter",
            Self::Github => "github",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SIGN-UP OUTCOME
// =============================================================================

/// Result of a successful sign-up call.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The provider issued a session immediately.
    Session(Session),
    /// The provider requires email verification before a session exists.
    VerificationPending,
}

// =============================================================================
// IDENTITY SERVICE TRAIT
// =============================================================================

/// Provider-neutral async capability for the identity backend. Enables
/// mocking in tests.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Look up an existing session, typically once at process start.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Network`] when the provider is unreachable.
    async fn probe_session(&self) -> Result<Option<Session>, ServiceError>;

    /// Sign in with an email/password pair. A successful call also emits
    /// `SIGNED_IN` on the notification channel.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCredentials`] on a rejected pair, or
    /// [`ServiceError::Network`] when the provider is unreachable.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ServiceError>;

    /// Create an account. `metadata` is forwarded verbatim to the provider
    /// as the user's profile data.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EmailInUse`], [`ServiceError::WeakPassword`],
    /// or [`ServiceError::Network`].
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome, ServiceError>;

    /// Fire the redirect-based authorization flow for `provider`. Resolves
    /// once the redirect is initiated; the session, if any, arrives later
    /// through the notification channel via the deep-link callback.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ProviderUnavailable`] when the redirect could
    /// not be initiated. A denied authorization is not an error here; it
    /// simply never produces a `SIGNED_IN` event.
    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_target: &str) -> Result<(), ServiceError>;

    /// End the current session. Implementations clear local session state
    /// and emit `SIGNED_OUT` even when the revoke round-trip fails, so
    /// callers may proceed regardless.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Network`] when the revoke call fails.
    async fn sign_out(&self) -> Result<(), ServiceError>;
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
