use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: the auth provider adapter, the audit sink, and the guard itself.
pub mod audit;
pub mod auth;
pub mod config;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod views;

// The static route table of the shell (public and authenticated pages).
pub mod routes;

// --- Public Re-exports ---

pub use audit::{AuditState, MemoryAuditSink, TracingAuditSink};
pub use auth::{AuthProviderState, MockAuthProvider, SupabaseAuthProvider};
pub use config::AppConfig;
pub use guard::NavigationGuard;
pub use routes::RouteTable;

/// ApiDoc
///
/// OpenAPI document for the JSON surface, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::resolve_navigation),
    components(
        schemas(
            models::Decision, models::RedirectTarget, models::NavigationResponse,
            models::PageView, models::Role,
        )
    ),
    tags(
        (name = "clinic-portal", description = "Dashboard shell navigation API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state of the service: the navigation guard (with its injected
/// auth provider, audit sink and route table) and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub guard: NavigationGuard,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        provider: AuthProviderState,
        audit: AuditState,
        routes: RouteTable,
    ) -> Self {
        let guard = NavigationGuard::new(provider, audit, Arc::new(routes), &config.app_name);
        Self { guard, config }
    }
}

impl FromRef<AppState> for NavigationGuard {
    fn from_ref(app_state: &AppState) -> NavigationGuard {
        app_state.guard.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the service: guarded pages, the navigation API, health and docs,
/// wrapped in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Pages: every path not claimed by a route below is a navigation inside the
        // shell. The guard layer is applied before the API routes are added, so it
        // only wraps the pages.
        .fallback(handlers::render_page)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::navigation_guard,
        ))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .route("/api/navigation", get(handlers::resolve_navigation))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, correlated by the generated `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
