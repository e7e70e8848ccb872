//! Session data model: the session record, the three-way auth state, and
//! the provider notification events.
//!
//! A `Session` is replaced wholesale on every sign-in, refresh, or profile
//! update; nothing in this crate mutates one in place. The `raw` payload
//! (tokens, expiry) is carried opaquely for the embedding app and never
//! inspected here.

use serde::{Deserialize, Serialize};

// =============================================================================
// SESSION
// =============================================================================

/// A successfully authenticated identity, as issued by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque stable user identifier. Non-empty, immutable for the life of the session.
    pub user_id: String,
    /// Account email. May be empty for providers that do not supply one.
    #[serde(default)]
    pub email: String,
    /// Provider timestamp of the most recent sign-in, RFC 3339 text.
    /// Non-decreasing across refreshes of the same session.
    #[serde(default)]
    pub last_sign_in_at: String,
    /// Opaque provider payload (tokens, expiry). Forwarded, never inspected.
    #[serde(default)]
    pub raw: serde_json::Value,
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

/// Notification-channel events pushed by the identity service.
///
/// Wire names match the provider's event strings, so a logged or persisted
/// event reads the same as the provider's own payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    /// A session was established (password, sign-up, or OAuth callback).
    SignedIn { session: Session },
    /// The session ended, locally or by forced expiry.
    SignedOut,
    /// The provider rotated tokens; carries the refreshed session.
    TokenRefreshed { session: Session },
    /// Profile data changed; carries the updated session.
    UserUpdated { session: Session },
}

impl AuthEvent {
    /// The provider's event name, for log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed { .. } => "TOKEN_REFRESHED",
            Self::UserUpdated { .. } => "USER_UPDATED",
        }
    }
}

// =============================================================================
// AUTH STATE
// =============================================================================

/// The three-way determination of session validity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// No determination yet; the initial probe has not resolved.
    #[default]
    Unknown,
    /// A live session. Always carries exactly one [`Session`].
    Authenticated(Session),
    /// Explicit negative determination.
    Unauthenticated,
}

impl AuthState {
    /// Whether this state carries a live session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The session, if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Short state name, for log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticated(_) => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
