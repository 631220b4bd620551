use crate::{
    AppState,
    auth::SessionCredentials,
    config::{AppConfig, Env},
    guard::NavigationGuard,
    models::{Decision, NavigationQuery, NavigationResponse, PageView},
    views::{RouterError, View},
};
use axum::{
    Json,
    extract::{Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

/// Response header carrying router error detail in local development.
pub const ROUTER_ERROR_HEADER: &str = "x-router-error";

/// A failed page render. The error travels in the response extensions so the
/// navigation middleware can run the router failure hook.
impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// navigation_guard
///
/// Middleware wrapped around every page of the shell. Runs the guard before the
/// page handler, maps the decision onto HTTP, runs the router failure hook when
/// the page cannot be produced, and writes the audit record last.
///
/// Proceed → the page. Redirect → `303 See Other`. Block → `204 No Content`,
/// which leaves the browser on the page it came from.
pub async fn navigation_guard(
    State(state): State<AppState>,
    credentials: SessionCredentials,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let to = full_path(request.uri());
    let from = referer_path(request.headers());
    let user_agent = user_agent(request.headers());

    let guard = &state.guard;
    let navigation = guard.navigation(&to, &from, &credentials, user_agent.as_deref());
    let outcome = guard.before_each(&navigation).await;

    let mut decision = outcome.decision.clone();
    let mut router_error = None;

    let response = match &outcome.decision {
        Decision::Proceed => {
            let response = next.run(request).await;
            match response.extensions().get::<RouterError>().cloned() {
                None => response,
                Some(error) => {
                    decision = guard.on_error(&error, &navigation);
                    router_error = Some(error);
                    interrupt(&decision)
                }
            }
        }
        other => interrupt(other),
    };

    guard.after_each(&navigation, &decision);

    let response = match router_error {
        Some(error) => with_router_error_detail(response, &error, &state.config),
        None => response,
    };
    with_session_cleared(response, outcome.signed_out, &state.config)
}

/// render_page
///
/// Serves the shell descriptor for a route the guard allowed.
pub async fn render_page(
    State(guard): State<NavigationGuard>,
    State(config): State<AppConfig>,
    uri: Uri,
) -> Result<Json<PageView>, RouterError> {
    let path = full_path(&uri);
    let route = guard.routes().resolve(&path);
    let view = View::for_route(route.name())?;
    let title = route.route.document_title(&config.app_name);
    Ok(Json(view.page(&route, title)))
}

/// resolve_navigation
///
/// Runs the navigation guard for a client that does its own client-side routing
/// and reports where that client should end up. Audited like a page navigation.
#[utoipa::path(
    get,
    path = "/api/navigation",
    params(NavigationQuery),
    responses((status = 200, description = "Guard decision", body = NavigationResponse))
)]
pub async fn resolve_navigation(
    State(state): State<AppState>,
    credentials: SessionCredentials,
    headers: HeaderMap,
    Query(query): Query<NavigationQuery>,
) -> Response {
    let from = query.from.unwrap_or_else(|| "/".to_string());
    let user_agent = user_agent(&headers);

    let guard = &state.guard;
    let navigation = guard.navigation(&query.to, &from, &credentials, user_agent.as_deref());
    let outcome = guard.before_each(&navigation).await;
    guard.after_each(&navigation, &outcome.decision);

    let location = match &outcome.decision {
        Decision::Proceed => Some(navigation.to.full_path.clone()),
        Decision::Redirect(target) => Some(target.location.clone()),
        Decision::Block => None,
    };

    let body = Json(NavigationResponse {
        decision: outcome.decision,
        location,
        document_title: outcome.document_title,
    });
    with_session_cleared(body.into_response(), outcome.signed_out, &state.config)
}

// --- Helpers ---

/// Response for a navigation that does not reach the page handler.
fn interrupt(decision: &Decision) -> Response {
    match decision {
        Decision::Redirect(target) => Redirect::to(&target.location).into_response(),
        Decision::Proceed | Decision::Block => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Drops the session cookie after a forced sign-out.
fn with_session_cleared(response: Response, signed_out: bool, config: &AppConfig) -> Response {
    if !signed_out {
        return response;
    }
    // `CookieJar::remove` only emits a removal for cookies the jar was built from,
    // so the expired cookie is added explicitly.
    let mut removal = Cookie::build((config.session_cookie.clone(), ""))
        .path("/")
        .build();
    removal.make_removal();
    (CookieJar::new().add(removal), response).into_response()
}

/// Router error detail is only exposed in local development.
fn with_router_error_detail(
    mut response: Response,
    error: &RouterError,
    config: &AppConfig,
) -> Response {
    if config.env != Env::Local {
        return response;
    }
    if let Ok(value) = HeaderValue::from_str(&error.to_string()) {
        response.headers_mut().insert(ROUTER_ERROR_HEADER, value);
    }
    response
}

fn full_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Path (and query) of the page the navigation started from, taken from `Referer`.
fn referer_path(headers: &HeaderMap) -> String {
    let Some(raw) = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
    else {
        return "/".to_string();
    };

    if raw.starts_with('/') {
        return raw.to_string();
    }

    match reqwest::Url::parse(raw) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => "/".to_string(),
    }
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
