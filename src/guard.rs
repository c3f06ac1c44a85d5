//! Route guard and the application route table
//!
//! Pure functions of a session snapshot: a view either waits for bootstrap,
//! renders, or redirects. Re-evaluate on every session change.

use crate::{models::Role, services::session::SessionSnapshot};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Bootstrap still running; show a placeholder
    Loading,
    Render,
    Redirect(&'static str),
}

/// Gate a view on the session and an optional required role
pub fn decide(session: &SessionSnapshot, required: Option<Role>) -> Decision {
    if session.loading {
        return Decision::Loading;
    }

    let Some(user) = &session.user else {
        return Decision::Redirect(LOGIN_PATH);
    };

    match required {
        Some(role) if user.role != role => Decision::Redirect(HOME_PATH),
        _ => Decision::Render,
    }
}

/// Who may reach a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub pattern: &'static str,
    pub access: Access,
}

pub const ROUTES: &[Route] = &[
    Route { pattern: "/", access: Access::Public },
    Route { pattern: "/login", access: Access::Public },
    Route { pattern: "/register", access: Access::Public },
    Route { pattern: "/dashboard", access: Access::Role(Role::Member) },
    Route { pattern: "/search", access: Access::Role(Role::Member) },
    Route { pattern: "/read/:bookId", access: Access::Role(Role::Member) },
    Route { pattern: "/payment", access: Access::Role(Role::Member) },
    Route { pattern: "/admin/dashboard", access: Access::Role(Role::Admin) },
    Route { pattern: "/admin/books", access: Access::Role(Role::Admin) },
    Route { pattern: "/admin/users", access: Access::Role(Role::Admin) },
];

impl Route {
    /// Match a concrete path. `:name` segments match any non-empty segment.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        let mut expected = self.pattern.split('/');
        let mut actual = path.split('/');
        loop {
            match (expected.next(), actual.next()) {
                (None, None) => return true,
                (Some(e), Some(a)) if e.starts_with(':') && !a.is_empty() => {}
                (Some(e), Some(a)) if e == a => {}
                _ => return false,
            }
        }
    }
}

pub fn route_for(path: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.matches(path))
}

/// Evaluate a concrete path. `None` for paths outside the route table.
pub fn evaluate_path(session: &SessionSnapshot, path: &str) -> Option<Decision> {
    let route = route_for(path)?;
    Some(match route.access {
        Access::Public => Decision::Render,
        Access::Role(role) => decide(session, Some(role)),
    })
}
