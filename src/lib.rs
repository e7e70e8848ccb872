//! Client-side session state and route gating for a Supabase-backed app.
//!
//! This crate owns the full lifecycle of the signed-in state: probing the
//! identity provider once at startup, serializing provider notifications
//! into a single [`store::SessionStore`], fanning transitions out to
//! subscribers, and deciding per screen whether to render or redirect via
//! [`gate`] policies. The embedding shell provides only the thin edges: a
//! [`router::Router`] to navigate with and a browser opener for OAuth
//! redirects.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Session payload, auth events, and the three-valued [`session::AuthState`] |
//! | [`store`] | Serialized session-state machine and its subscriptions |
//! | [`gate`] | Route-gating policies and the per-mount [`gate::GateCore`] |
//! | [`flows`] | Login, registration, OAuth initiation, and logout flows |
//! | [`identity`] | Provider-neutral [`identity::IdentityService`] capability |
//! | [`supabase`] | GoTrue REST implementation of the identity service |
//! | [`router`] | Navigation capability the gates redirect through |

pub mod flows;
pub mod gate;
pub mod identity;
pub mod router;
pub mod session;
pub mod store;
pub mod supabase;
