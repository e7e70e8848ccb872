//! Supabase GoTrue client: the reference [`IdentityService`] implementation.
//!
//! DESIGN
//! ======
//! Talks to the GoTrue REST surface under `{project url}/auth/v1` with the
//! project's anon key. The client keeps the authed session (payload plus
//! access token) in-process; persistence across launches is the embedding
//! app's job via [`SupabaseIdentity::restore`]. Session changes are pushed
//! as [`AuthEvent`]s on the channel handed out at construction, which the
//! app wires to a [`crate::store::SessionStore`] with
//! [`crate::store::spawn_event_pump`]. Local sign-out always wins: the
//! session is cleared and `SIGNED_OUT` emitted before the revoke
//! round-trip, so a dead network cannot trap the user in a session.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::identity::{IdentityService, OAuthProvider, ServiceError, SignUpOutcome};
use crate::session::{AuthEvent, Session};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Supabase project configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    /// Load from `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    /// Returns `None` if either is missing.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok()?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY").ok()?;
        Some(Self { url, anon_key })
    }

    /// Base of the GoTrue REST surface for this project.
    #[must_use]
    pub fn auth_base(&self) -> String {
        format!("{}/auth/v1", self.url.trim_end_matches('/'))
    }

    /// Build the browser-facing authorization URL for `provider`, with the
    /// deep link the provider should send the user back to.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ProviderUnavailable`] when the configured
    /// project URL does not parse.
    pub fn authorize_url(&self, provider: OAuthProvider, redirect_target: &str) -> Result<String, ServiceError> {
        let mut url = reqwest::Url::parse(&format!("{}/authorize", self.auth_base()))
            .map_err(|e| ServiceError::ProviderUnavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_target);
        Ok(url.to_string())
    }
}

// =============================================================================
// BROWSER OPENER
// =============================================================================

/// Opens the system browser (or in-app tab) on an authorization URL.
/// Platform shells provide the real implementation.
pub trait BrowserOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the URL could not be handed to the platform.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

// =============================================================================
// WIRE PARSING
// =============================================================================

/// Session plus the bearer token GoTrue issued alongside it.
#[derive(Debug, Clone)]
struct AuthedSession {
    session: Session,
    access_token: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

/// Map a GoTrue error response onto the service error taxonomy. GoTrue has
/// used both OAuth-style (`error`/`error_description`) and its own
/// (`error_code`/`msg`) body shapes, so both are consulted.
fn map_error_body(status: reqwest::StatusCode, body: &str) -> ServiceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.or(parsed.error).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.error_description)
        .unwrap_or_else(|| body.to_string());
    match code.as_str() {
        "invalid_grant" | "invalid_credentials" => ServiceError::InvalidCredentials,
        "user_already_exists" | "email_exists" => ServiceError::EmailInUse,
        "weak_password" => ServiceError::WeakPassword,
        _ if message.contains("already registered") => ServiceError::EmailInUse,
        _ => ServiceError::Other(format!("{status}: {message}")),
    }
}

/// Parse a GoTrue token-grant body into a session. The whole body is kept
/// as the session's raw payload.
fn session_from_token_body(body: &str) -> Result<AuthedSession, ServiceError> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|_| ServiceError::Other(format!("unexpected token response: {body}")))?;
    let access_token = raw
        .get("access_token")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if access_token.is_empty() {
        return Err(ServiceError::Other("token response missing access_token".into()));
    }
    let user = raw.get("user").cloned().unwrap_or(Value::Null);
    let user_id = user.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    if user_id.is_empty() {
        return Err(ServiceError::Other("token response missing user id".into()));
    }
    let session = Session {
        user_id,
        email: user.get("email").and_then(Value::as_str).unwrap_or_default().to_string(),
        last_sign_in_at: user
            .get("last_sign_in_at")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        raw,
    };
    Ok(AuthedSession { session, access_token })
}

/// A sign-up body carries a token grant when the project auto-confirms,
/// and just the pending user otherwise.
fn parse_signup_body(body: &str) -> Result<Option<AuthedSession>, ServiceError> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|_| ServiceError::Other(format!("unexpected signup response: {body}")))?;
    if raw.get("access_token").and_then(Value::as_str).is_some() {
        session_from_token_body(body).map(Some)
    } else {
        Ok(None)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// GoTrue-backed identity service.
pub struct SupabaseIdentity {
    config: SupabaseConfig,
    http: reqwest::Client,
    opener: Arc<dyn BrowserOpener>,
    current: Mutex<Option<AuthedSession>>,
    events: mpsc::UnboundedSender<AuthEvent>,
}

impl SupabaseIdentity {
    /// Build the client and the receiving half of its notification channel.
    #[must_use]
    pub fn new(config: SupabaseConfig, opener: Arc<dyn BrowserOpener>) -> (Self, mpsc::UnboundedReceiver<AuthEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            http: reqwest::Client::new(),
            opener,
            current: Mutex::new(None),
            events,
        };
        (client, rx)
    }

    /// Seed a session persisted by a previous launch, before the store
    /// probes. Does not emit an event; the probe settles the state.
    pub fn restore(&self, session: Session, access_token: String) {
        *self.session_lock() = Some(AuthedSession { session, access_token });
    }

    fn session_lock(&self) -> MutexGuard<'_, Option<AuthedSession>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "emitting auth event");
        let _ = self.events.send(event);
    }
}

#[async_trait::async_trait]
impl IdentityService for SupabaseIdentity {
    async fn probe_session(&self) -> Result<Option<Session>, ServiceError> {
        let stored = self.session_lock().clone();
        let Some(authed) = stored else {
            debug!("no persisted session to probe");
            return Ok(None);
        };

        let resp = self
            .http
            .get(format!("{}/user", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", authed.access_token))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("persisted session no longer valid");
            let mut current = self.session_lock();
            // Only clear if nothing newer was stored while the probe ran.
            if current.as_ref().is_some_and(|a| a.access_token == authed.access_token) {
                current.take();
            }
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ServiceError::Network(format!("user probe returned {}", resp.status())));
        }
        Ok(Some(authed.session))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/token?grant_type=password", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(map_error_body(status, &body));
        }

        let body = resp.text().await.map_err(|e| ServiceError::Network(e.to_string()))?;
        let authed = session_from_token_body(&body)?;
        let session = authed.session.clone();
        *self.session_lock() = Some(authed);
        self.emit(AuthEvent::SignedIn { session: session.clone() });
        info!(user_id = %session.user_id, "password sign-in succeeded");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome, ServiceError> {
        let resp = self
            .http
            .post(format!("{}/signup", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(map_error_body(status, &body));
        }

        let body = resp.text().await.map_err(|e| ServiceError::Network(e.to_string()))?;
        match parse_signup_body(&body)? {
            Some(authed) => {
                let session = authed.session.clone();
                *self.session_lock() = Some(authed);
                self.emit(AuthEvent::SignedIn { session: session.clone() });
                info!(user_id = %session.user_id, "sign-up issued an immediate session");
                Ok(SignUpOutcome::Session(session))
            }
            None => {
                info!("sign-up accepted, awaiting email verification");
                Ok(SignUpOutcome::VerificationPending)
            }
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_target: &str) -> Result<(), ServiceError> {
        let url = self.config.authorize_url(provider, redirect_target)?;
        info!(%provider, "opening oauth authorize url");
        self.opener
            .open(&url)
            .map_err(|e| ServiceError::ProviderUnavailable(e.to_string()))
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let authed = self.session_lock().take();
        // Local state goes first: the user is signed out whether or not the
        // revoke round-trip lands.
        self.emit(AuthEvent::SignedOut);

        let Some(authed) = authed else {
            debug!("sign-out with no active session");
            return Ok(());
        };

        let resp = self
            .http
            .post(format!("{}/logout", self.config.auth_base()))
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", authed.access_token))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "logout revoke returned an error status");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
