use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity Schemas (Owned by the Auth Provider) ---

/// Role
///
/// The closed set of roles stored in the `role` column of the `profiles` table.
/// Role strings are matched exactly; anything else (including a missing role) is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    Doctor,
    Patient,
    Unknown,
}

impl Role {
    /// Maps the raw profile column onto the closed role set.
    pub fn from_profile(raw: Option<&str>) -> Self {
        match raw {
            Some("Doctor") => Role::Doctor,
            Some("Patient") => Role::Patient,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "Doctor",
            Role::Patient => "Patient",
            Role::Unknown => "Unknown",
        }
    }
}

/// Session
///
/// Proof of an authenticated user, as resolved by the `AuthProvider`.
/// The guard only reads it; it is created and destroyed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Primary key of the user, also the key of the `profiles` row.
    pub user_id: Uuid,
    pub email: Option<String>,
    /// The raw access token, forwarded to the provider for profile reads and sign-out.
    /// Absent for sessions created through the local development bypass.
    pub access_token: Option<String>,
}

/// ProfileRow
///
/// Raw PostgREST row returned by `profiles?select=role`. A `null` role is kept as `None`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileRow {
    pub role: Option<String>,
}

// --- Navigation Schemas (Output) ---

/// RedirectTarget
///
/// A named route the guard sends the user to instead of the requested one.
/// `location` is the resolved path (with the encoded query) ready for a `Location` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RedirectTarget {
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub query: BTreeMap<String, String>,
}

/// Decision
///
/// The three possible answers of the navigation guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Decision {
    /// Navigate to the requested route unmodified.
    Proceed,
    /// Abort the requested navigation and go to the named route instead.
    Redirect(RedirectTarget),
    /// Abort the navigation and stay on the current route.
    Block,
}

impl Decision {
    pub fn redirect_name(&self) -> Option<&str> {
        match self {
            Decision::Redirect(target) => Some(target.name.as_str()),
            _ => None,
        }
    }
}

/// NavigationQuery
///
/// Query parameters accepted by `GET /api/navigation`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct NavigationQuery {
    /// Full path (path and query) the client wants to open.
    pub to: String,
    /// Full path the client is currently on. Defaults to `/`.
    pub from: Option<String>,
}

/// NavigationResponse
///
/// Output of `GET /api/navigation`, for clients that perform their own client-side routing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationResponse {
    pub decision: Decision,
    /// Where the client ends up: the requested path, the redirect location, or `None` when blocked.
    pub location: Option<String>,
    pub document_title: Option<String>,
}

/// PageView
///
/// Minimal descriptor of the page shell served for an allowed navigation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PageView {
    /// Route name (e.g. "doctor-dashboard").
    pub route: String,
    /// Name of the client-side component that renders this route.
    pub component: String,
    pub path: String,
    pub full_path: String,
    pub document_title: Option<String>,
}

// --- Audit Records ---

/// AuditEntry
///
/// Append-only record written to the `AuditSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntry {
    /// A completed transition, written after every navigation.
    RouteChange {
        timestamp: DateTime<Utc>,
        from: String,
        to: String,
        requires_auth: bool,
    },
    /// An unexpected failure inside the guard.
    NavigationError {
        timestamp: DateTime<Utc>,
        from: String,
        to: String,
        error: String,
        user_agent: Option<String>,
    },
    /// The page for a resolved route could not be produced.
    RouterError {
        timestamp: DateTime<Utc>,
        from: String,
        to: String,
        error: String,
    },
}
