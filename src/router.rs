//! Routing capability: the navigation primitives the gates drive.
//!
//! The embedding app owns the real router (history stack, deep links); this
//! crate only ever asks it to navigate somewhere, replacing or pushing.

use std::fmt;

/// An application route path (e.g. `"/login"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(pub String);

impl Route {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The login screen, default redirect for [`crate::gate::RequireAuth`].
    #[must_use]
    pub fn login() -> Self {
        Self::new("/login")
    }

    /// The signed-in home screen, default redirect for
    /// [`crate::gate::RequireNoAuth`].
    #[must_use]
    pub fn home() -> Self {
        Self::new("/home")
    }

    /// The route path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// History behavior for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// Replace the current history entry; back-navigation cannot return.
    Replace,
    /// Push a new history entry.
    Push,
}

/// Navigation capability implemented by the embedding app's router.
pub trait Router: Send + Sync {
    /// Navigate to `route` with the given history behavior.
    fn navigate(&self, route: &Route, mode: NavMode);
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
