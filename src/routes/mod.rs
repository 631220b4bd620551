use crate::models::Role;
use std::collections::HashSet;

/// Route Table Module
///
/// The static, ordered list of page routes served by the shell, segregated by access
/// policy the same way the pages are: routes open to anonymous visitors, and routes
/// that require a signed-in user. The table is built once at startup and never mutated.

/// Routes open to anonymous visitors (login, registration, error pages).
pub mod public;

/// Routes that require a session, optionally restricted to a role.
pub mod authenticated;

// --- Route names (public contract) ---

pub const LOGIN: &str = "login";
pub const REGISTER: &str = "register";
pub const DOCTOR_DASHBOARD: &str = "doctor-dashboard";
pub const PATIENT_DASHBOARD: &str = "patient-dashboard";
pub const PROFILE: &str = "profile";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const NOT_FOUND: &str = "not-found";

/// RouteMeta
///
/// Access policy attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    /// Role required to open the route. `None` means no role restriction.
    pub role: Option<Role>,
    /// Signed-in users must never land on this route.
    pub hide_for_auth: bool,
    pub title: Option<&'static str>,
}

/// RouteDefinition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Match key. For the catch-all route this is only the canonical path used
    /// when the route is the target of a named redirect.
    pub path: &'static str,
    pub name: &'static str,
    /// Matches every path no other route matched.
    pub catch_all: bool,
    pub meta: RouteMeta,
}

impl RouteDefinition {
    pub fn new(path: &'static str, name: &'static str, meta: RouteMeta) -> Self {
        Self {
            path,
            name,
            catch_all: false,
            meta,
        }
    }

    pub fn catch_all(path: &'static str, name: &'static str, meta: RouteMeta) -> Self {
        Self {
            path,
            name,
            catch_all: true,
            meta,
        }
    }

    /// Title shown by the client, suffixed with the application name.
    pub fn document_title(&self, app_name: &str) -> Option<String> {
        self.meta.title.map(|title| format!("{} | {}", title, app_name))
    }
}

/// ResolvedRoute
///
/// A concrete location matched against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub route: &'a RouteDefinition,
    /// Requested path, without query.
    pub path: String,
    /// Path plus query string exactly as requested.
    pub full_path: String,
}

impl ResolvedRoute<'_> {
    pub fn name(&self) -> &'static str {
        self.route.name
    }

    pub fn meta(&self) -> &RouteMeta {
        &self.route.meta
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("duplicate route name: {0}")]
    DuplicateName(&'static str),
    #[error("duplicate route path: {0}")]
    DuplicatePath(&'static str),
    #[error("route table has no catch-all route")]
    MissingCatchAll,
    #[error("catch-all route {0} must be the last route")]
    CatchAllNotLast(&'static str),
}

/// RouteTable
///
/// Given a path, returns the unique matching definition, or the catch-all route.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    /// Builds a table after checking its invariants: unique names, unique paths,
    /// and exactly one catch-all route placed last.
    pub fn new(routes: Vec<RouteDefinition>) -> Result<Self, RouteTableError> {
        let mut names = HashSet::new();
        let mut paths = HashSet::new();

        for (index, route) in routes.iter().enumerate() {
            if !names.insert(route.name) {
                return Err(RouteTableError::DuplicateName(route.name));
            }
            if !paths.insert(normalize_path(route.path)) {
                return Err(RouteTableError::DuplicatePath(route.path));
            }
            if route.catch_all && index + 1 != routes.len() {
                return Err(RouteTableError::CatchAllNotLast(route.name));
            }
        }

        match routes.last() {
            Some(last) if last.catch_all => Ok(Self { routes }),
            _ => Err(RouteTableError::MissingCatchAll),
        }
    }

    /// The application's route table.
    pub fn standard() -> Self {
        let mut routes = public::public_routes();
        routes.extend(authenticated::authenticated_routes());
        routes.push(public::not_found_route());
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn by_name(&self, name: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// resolve
    ///
    /// Matches a full path (`/path?query`) against the table. Matching ignores case,
    /// a trailing slash, and the query string.
    pub fn resolve(&self, full_path: &str) -> ResolvedRoute<'_> {
        let full_path = if full_path.starts_with('/') {
            full_path.to_string()
        } else {
            format!("/{}", full_path)
        };
        let path = full_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        let key = normalize_path(&path);

        let route = self
            .routes
            .iter()
            .find(|route| !route.catch_all && normalize_path(route.path) == key)
            .unwrap_or_else(|| self.catch_all_route());

        ResolvedRoute {
            route,
            path,
            full_path,
        }
    }

    fn catch_all_route(&self) -> &RouteDefinition {
        // `new` and `standard` both guarantee a trailing catch-all.
        &self.routes[self.routes.len() - 1]
    }
}

/// Lowercases and strips a trailing slash (the root path stays `/`).
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_lowercase()
    }
}
