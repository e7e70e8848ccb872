use std::sync::Arc;

use super::*;
use crate::identity::test_helpers::MockIdentity;
use crate::session::AuthState;
use crate::session::test_helpers::dummy_session;
use crate::store::{SessionStore, spawn_event_pump};

fn flows_with_mock() -> (AuthFlows, Arc<MockIdentity>) {
    let mock = Arc::new(MockIdentity::new());
    (AuthFlows::new(mock.clone()), mock)
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn login_rejects_empty_fields_before_any_call() {
    let (flows, mock) = flows_with_mock();

    let missing_email = flows.login("", "hunter2").await;
    let missing_password = flows.login("ada@example.com", "").await;

    assert!(matches!(missing_email, Err(AuthError::Validation(ValidationError::MissingFields))));
    assert!(matches!(missing_password, Err(AuthError::Validation(ValidationError::MissingFields))));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn login_success_reaches_store_through_events() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);
    let mut sub = store.subscribe();

    flows.login("ada@example.com", "hunter2").await.unwrap();

    assert_eq!(sub.next().await, Some(AuthState::Authenticated(dummy_session("mock-user"))));
}

#[tokio::test]
async fn failed_login_leaves_store_unchanged() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);
    mock.push_sign_in(Err(ServiceError::InvalidCredentials));

    let result = flows.login("ada@example.com", "wrong").await;

    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    // No event was emitted, so the store never moved.
    assert_eq!(store.current(), AuthState::Unknown);
}

#[tokio::test]
async fn login_maps_service_failures() {
    let (flows, mock) = flows_with_mock();

    mock.push_sign_in(Err(ServiceError::Network("dns".into())));
    assert!(matches!(flows.login("a@b.c", "pw").await, Err(AuthError::Network(_))));

    mock.push_sign_in(Err(ServiceError::Other("teapot".into())));
    assert!(matches!(flows.login("a@b.c", "pw").await, Err(AuthError::Unknown(_))));
}

// =========================================================================
// Register
// =========================================================================

#[tokio::test]
async fn register_rejects_missing_fields_before_any_call() {
    let (flows, mock) = flows_with_mock();

    let result = flows.register("", "ada@example.com", "hunter2", "hunter2").await;

    assert!(matches!(result, Err(AuthError::Validation(ValidationError::MissingFields))));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn register_rejects_password_mismatch_before_any_call() {
    let (flows, mock) = flows_with_mock();

    let result = flows.register("Ada Lovelace", "ada@example.com", "hunter2", "hunter3").await;

    assert!(matches!(result, Err(AuthError::Validation(ValidationError::PasswordMismatch))));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn register_forwards_full_name_as_metadata() {
    let (flows, mock) = flows_with_mock();

    flows.register("Ada Lovelace", "ada@example.com", "hunter2", "hunter2").await.unwrap();

    let requests = mock.sign_up_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "ada@example.com");
    assert_eq!(requests[0].1, serde_json::json!({ "full_name": "Ada Lovelace" }));
}

#[tokio::test]
async fn register_with_verification_pending_is_not_a_sign_in() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);

    let outcome = flows.register("Ada Lovelace", "ada@example.com", "hunter2", "hunter2").await.unwrap();

    assert_eq!(outcome, RegisterOutcome::VerificationPending);
    assert_eq!(store.current(), AuthState::Unknown);
}

#[tokio::test]
async fn register_with_immediate_session_signs_in() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);
    let mut sub = store.subscribe();
    mock.push_sign_up(Ok(SignUpOutcome::Session(dummy_session("u-new"))));

    let outcome = flows.register("New User", "new@example.com", "hunter2", "hunter2").await.unwrap();

    assert_eq!(outcome, RegisterOutcome::SessionEstablished);
    assert_eq!(sub.next().await, Some(AuthState::Authenticated(dummy_session("u-new"))));
}

#[tokio::test]
async fn register_maps_service_failures() {
    let (flows, mock) = flows_with_mock();

    mock.push_sign_up(Err(ServiceError::EmailInUse));
    let taken = flows.register("A", "taken@example.com", "hunter2", "hunter2").await;
    assert!(matches!(taken, Err(AuthError::EmailInUse)));

    mock.push_sign_up(Err(ServiceError::WeakPassword));
    let weak = flows.register("A", "new@example.com", "123", "123").await;
    assert!(matches!(weak, Err(AuthError::WeakPassword)));
}

// =========================================================================
// OAuth
// =========================================================================

#[tokio::test]
async fn oauth_forwards_provider_and_redirect_target() {
    let (flows, mock) = flows_with_mock();

    flows.initiate_oauth(OAuthProvider::Google, "myapp://auth-callback").await.unwrap();

    assert_eq!(mock.oauth_requests(), vec![(OAuthProvider::Google, "myapp://auth-callback".to_string())]);
}

#[tokio::test]
async fn oauth_failure_maps_to_provider_unavailable() {
    let (flows, mock) = flows_with_mock();
    mock.push_oauth(Err(ServiceError::ProviderUnavailable("redirect blocked".into())));

    let result = flows.initiate_oauth(OAuthProvider::Twitter, "myapp://auth-callback").await;

    assert!(matches!(result, Err(AuthError::ProviderUnavailable(_))));
}

#[tokio::test]
async fn oauth_initiation_alone_does_not_sign_in() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);

    flows.initiate_oauth(OAuthProvider::Github, "myapp://auth-callback").await.unwrap();

    // The session only lands when the deep-link callback produces an event.
    assert_eq!(store.current(), AuthState::Unknown);
}

// =========================================================================
// Logout
// =========================================================================

#[tokio::test]
async fn logout_succeeds_even_when_revoke_fails() {
    let (flows, mock) = flows_with_mock();
    let events = mock.attach_events();
    let store = SessionStore::new();
    let _pump = spawn_event_pump(store.clone(), events);
    let mut sub = store.subscribe();
    mock.push_sign_out(Err(ServiceError::Network("airplane mode".into())));

    flows.logout().await.unwrap();

    // SIGNED_OUT was still emitted, so the store ends up signed out.
    assert_eq!(sub.next().await, Some(AuthState::Unauthenticated));
}

#[tokio::test]
async fn logout_propagates_non_network_failures() {
    let (flows, mock) = flows_with_mock();
    mock.push_sign_out(Err(ServiceError::Other("revoked token".into())));

    assert!(matches!(flows.logout().await, Err(AuthError::Unknown(_))));
}

// =========================================================================
// Single-flight guard
// =========================================================================

#[tokio::test]
async fn second_guarded_flow_is_rejected_while_first_runs() {
    let (flows, mock) = flows_with_mock();
    let release = mock.hold_sign_in();

    let racer = {
        let flows = flows.clone();
        tokio::spawn(async move { flows.login("ada@example.com", "hunter2").await })
    };
    while mock.call_count("sign_in_with_password") == 0 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(flows.logout().await, Err(AuthError::Busy)));
    assert_eq!(mock.call_count("sign_out"), 0);

    release.send(()).unwrap();
    assert!(racer.await.unwrap().is_ok());
}

#[tokio::test]
async fn guard_is_released_after_a_flow_settles() {
    let (flows, mock) = flows_with_mock();
    mock.push_sign_in(Err(ServiceError::InvalidCredentials));

    assert!(flows.login("ada@example.com", "wrong").await.is_err());

    // The failed attempt released the guard, so logout is not Busy.
    flows.logout().await.unwrap();
}

#[tokio::test]
async fn oauth_is_exempt_from_the_guard() {
    let (flows, mock) = flows_with_mock();
    let release = mock.hold_sign_in();

    let racer = {
        let flows = flows.clone();
        tokio::spawn(async move { flows.login("ada@example.com", "hunter2").await })
    };
    while mock.call_count("sign_in_with_password") == 0 {
        tokio::task::yield_now().await;
    }

    flows.initiate_oauth(OAuthProvider::Google, "myapp://auth-callback").await.unwrap();

    release.send(()).unwrap();
    assert!(racer.await.unwrap().is_ok());
}

// =========================================================================
// Error display
// =========================================================================

#[test]
fn errors_read_as_user_facing_messages() {
    assert_eq!(ValidationError::MissingFields.to_string(), "all fields are required");
    assert_eq!(ValidationError::PasswordMismatch.to_string(), "passwords do not match");
    assert_eq!(
        AuthError::Validation(ValidationError::PasswordMismatch).to_string(),
        "passwords do not match"
    );
    assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid email or password");
    assert_eq!(AuthError::Busy.to_string(), "another auth request is already in flight");
}
