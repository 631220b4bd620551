use super::{LOGIN, NOT_FOUND, REGISTER, RouteDefinition, RouteMeta, UNAUTHORIZED};

/// Public Route Definitions
///
/// Pages reachable without a session. Login and registration are additionally
/// flagged `hide_for_auth`: a signed-in user is always sent to their dashboard instead.
pub fn public_routes() -> Vec<RouteDefinition> {
    vec![
        // GET /
        // The login page doubles as the landing page.
        RouteDefinition::new(
            "/",
            LOGIN,
            RouteMeta {
                title: Some("Login"),
                hide_for_auth: true,
                ..RouteMeta::default()
            },
        ),
        // GET /register
        RouteDefinition::new(
            "/register",
            REGISTER,
            RouteMeta {
                title: Some("Register"),
                hide_for_auth: true,
                ..RouteMeta::default()
            },
        ),
        // GET /unauthorized
        // Fail-safe destination for failed or unrecognized role checks.
        RouteDefinition::new(
            "/unauthorized",
            UNAUTHORIZED,
            RouteMeta {
                title: Some("Unauthorized"),
                ..RouteMeta::default()
            },
        ),
    ]
}

/// Catch-all for every path nothing else matched. Must stay the last route of the table.
pub fn not_found_route() -> RouteDefinition {
    RouteDefinition::catch_all(
        "/not-found",
        NOT_FOUND,
        RouteMeta {
            title: Some("Page Not Found"),
            ..RouteMeta::default()
        },
    )
}
