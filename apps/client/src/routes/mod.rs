//! Route table and navigation guard.
//!
//! `/` lands on the public application form. `/dashboard` and `/detail/:id` are
//! HR-only and bounce to `/login` without a session.

use std::fmt;
use std::sync::Mutex;

use tracing::info;

use crate::state::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Apply,
    Success,
    Login,
    Dashboard,
    Detail(String),
}

impl Route {
    /// Entry point for anonymous visitors.
    pub const HOME: Route = Route::Apply;

    pub fn parse(path: &str) -> Option<Route> {
        let trimmed = path.trim().trim_end_matches('/');
        match trimmed {
            "" => Some(Route::HOME),
            "/apply" => Some(Route::Apply),
            "/success" => Some(Route::Success),
            "/login" => Some(Route::Login),
            "/dashboard" => Some(Route::Dashboard),
            other => other
                .strip_prefix("/detail/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::Detail(id.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Apply => "/apply".to_string(),
            Route::Success => "/success".to_string(),
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Detail(id) => format!("/detail/{id}"),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Detail(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolves where a navigation to `target` actually ends up.
pub fn guard(target: Route, store: &SessionStore) -> Route {
    if target.requires_auth() && !store.is_authenticated() {
        return Route::Login;
    }
    if target == Route::Success && !store.has_just_submitted() {
        return Route::Apply;
    }
    target
}

/// Receives navigation transitions requested by the service.
pub trait Navigator: Send + Sync {
    /// Replace the current location (no back-stack entry).
    fn replace(&self, route: Route);
}

/// Navigator that records every transition, most recent last.
#[derive(Debug)]
pub struct RouteHistory {
    visited: Mutex<Vec<Route>>,
}

impl RouteHistory {
    pub fn new(start: Route) -> Self {
        Self {
            visited: Mutex::new(vec![start]),
        }
    }

    pub fn current(&self) -> Route {
        self.history().last().cloned().unwrap_or(Route::HOME)
    }

    pub fn history(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for RouteHistory {
    fn default() -> Self {
        Self::new(Route::HOME)
    }
}

impl Navigator for RouteHistory {
    fn replace(&self, route: Route) {
        info!(to = %route, "navigating");
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route);
    }
}
