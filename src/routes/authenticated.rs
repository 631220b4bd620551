use super::{DOCTOR_DASHBOARD, PATIENT_DASHBOARD, PROFILE, RouteDefinition, RouteMeta};
use crate::models::Role;

/// Authenticated Route Definitions
///
/// Pages that require a valid session. The dashboards are further restricted to a
/// single role; the role is read from the user's profile on every navigation.
pub fn authenticated_routes() -> Vec<RouteDefinition> {
    vec![
        // GET /doctor-dashboard
        RouteDefinition::new(
            "/doctor-dashboard",
            DOCTOR_DASHBOARD,
            RouteMeta {
                requires_auth: true,
                role: Some(Role::Doctor),
                title: Some("Doctor Dashboard"),
                ..RouteMeta::default()
            },
        ),
        // GET /patient-dashboard
        RouteDefinition::new(
            "/patient-dashboard",
            PATIENT_DASHBOARD,
            RouteMeta {
                requires_auth: true,
                role: Some(Role::Patient),
                title: Some("Patient Dashboard"),
                ..RouteMeta::default()
            },
        ),
        // GET /profile
        // Any signed-in user, no role check (and therefore no profile lookup).
        RouteDefinition::new(
            "/profile",
            PROFILE,
            RouteMeta {
                requires_auth: true,
                title: Some("Profile"),
                ..RouteMeta::default()
            },
        ),
    ]
}
