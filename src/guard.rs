use chrono::Utc;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    audit::AuditState,
    auth::{AuthError, AuthProviderState, SessionCredentials},
    models::{AuditEntry, Decision, RedirectTarget, Role},
    routes::{
        DOCTOR_DASHBOARD, LOGIN, NOT_FOUND, PATIENT_DASHBOARD, ResolvedRoute, RouteTable,
        UNAUTHORIZED,
    },
    views::RouterError,
};

/// Base used only to borrow `Url`'s path and query encoding.
const LOCATION_BASE: &str = "http://shell.local";

/// Failures the guard does not expect. They are audited and turned into a
/// redirect to login (or a block when login itself is the target).
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("forced sign-out failed: {0}")]
    SignOut(#[source] AuthError),
    #[error("redirect target {0} is not in the route table")]
    UnknownRoute(String),
    #[error("cannot build location for {path}: {reason}")]
    InvalidLocation { path: String, reason: String },
}

/// Navigation
///
/// One attempted transition, as seen by the guard.
#[derive(Debug, Clone)]
pub struct Navigation<'a> {
    pub to: ResolvedRoute<'a>,
    pub from: ResolvedRoute<'a>,
    pub credentials: &'a SessionCredentials,
    pub user_agent: Option<&'a str>,
}

/// GuardOutcome
#[derive(Debug, Clone, PartialEq)]
pub struct GuardOutcome {
    pub decision: Decision,
    /// `"{title} | {app name}"` of the requested route, when it has a title.
    pub document_title: Option<String>,
    /// The stale session was discarded; the caller must drop its local copy (cookie).
    pub signed_out: bool,
}

/// NavigationGuard
///
/// Decides, for every attempted navigation, whether it may proceed. Holds only
/// shared, immutable collaborators: every call re-runs the full check and nothing
/// is cached between navigations.
#[derive(Clone)]
pub struct NavigationGuard {
    provider: AuthProviderState,
    audit: AuditState,
    routes: Arc<RouteTable>,
    app_name: Arc<str>,
}

impl NavigationGuard {
    pub fn new(
        provider: AuthProviderState,
        audit: AuditState,
        routes: Arc<RouteTable>,
        app_name: &str,
    ) -> Self {
        Self {
            provider,
            audit,
            routes,
            app_name: Arc::from(app_name),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Resolves both ends of a transition against the route table.
    pub fn navigation<'a>(
        &'a self,
        to: &str,
        from: &str,
        credentials: &'a SessionCredentials,
        user_agent: Option<&'a str>,
    ) -> Navigation<'a> {
        Navigation {
            to: self.routes.resolve(to),
            from: self.routes.resolve(from),
            credentials,
            user_agent,
        }
    }

    /// before_each
    ///
    /// Runs the authorization checks for one navigation. Never fails: every
    /// provider error is converted into a decision.
    pub async fn before_each(&self, navigation: &Navigation<'_>) -> GuardOutcome {
        let mut signed_out = false;

        let decision = match self.evaluate(navigation, &mut signed_out).await {
            Ok(decision) => decision,
            Err(e) => self.recover(navigation, e),
        };

        GuardOutcome {
            decision,
            document_title: navigation.to.route.document_title(&self.app_name),
            signed_out,
        }
    }

    async fn evaluate(
        &self,
        navigation: &Navigation<'_>,
        signed_out: &mut bool,
    ) -> Result<Decision, GuardError> {
        let to = &navigation.to;

        // 1. Session lookup. A broken session is discarded, never trusted.
        let session = match self.provider.get_session(navigation.credentials).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Session error: {}", e);
                *signed_out = true;
                self.provider
                    .sign_out(navigation.credentials)
                    .await
                    .map_err(GuardError::SignOut)?;
                return self.redirect(LOGIN, BTreeMap::new());
            }
        };

        let meta = to.meta();

        // 2. Pages hidden from signed-in users (login, register).
        if meta.hide_for_auth {
            if let Some(session) = &session {
                let landing = match self.provider.get_profile_role(session).await {
                    Ok(role) => landing_for_signed_in(role),
                    Err(e) => {
                        tracing::error!("Profile fetch error: {}", e);
                        PATIENT_DASHBOARD
                    }
                };
                return self.redirect(landing, BTreeMap::new());
            }
        }

        // 3. Protected pages.
        if meta.requires_auth {
            let Some(session) = &session else {
                // Remember where the user was going so login can send them back.
                let query = BTreeMap::from([("redirect".to_string(), to.full_path.clone())]);
                return self.redirect(LOGIN, query);
            };

            if let Some(required) = meta.role {
                match self.provider.get_profile_role(session).await {
                    Err(e) => {
                        tracing::error!("Role check error: {}", e);
                        return self.redirect(UNAUTHORIZED, BTreeMap::new());
                    }
                    Ok(role) if role != required => {
                        tracing::info!(
                            "Role {} may not open {}; redirecting",
                            role.as_str(),
                            to.name()
                        );
                        return self.redirect(landing_for_role_mismatch(role), BTreeMap::new());
                    }
                    Ok(_) => {}
                }
            }
        }

        Ok(Decision::Proceed)
    }

    /// Outermost catch: audit the failure and fall back to a safe decision.
    fn recover(&self, navigation: &Navigation<'_>, error: GuardError) -> Decision {
        tracing::error!("Navigation guard error: {}", error);

        self.audit.record(AuditEntry::NavigationError {
            timestamp: Utc::now(),
            from: navigation.from.path.clone(),
            to: navigation.to.path.clone(),
            error: error.to_string(),
            user_agent: navigation.user_agent.map(str::to_string),
        });

        // Redirecting to login while already headed there would loop.
        if navigation.to.name() == LOGIN {
            return Decision::Block;
        }

        self.redirect(LOGIN, BTreeMap::new()).unwrap_or_else(|e| {
            tracing::error!("Cannot redirect to login: {}", e);
            Decision::Block
        })
    }

    /// after_each
    ///
    /// Records the completed transition with its final destination: the requested
    /// page, the redirect target, or the current page when blocked.
    pub fn after_each(&self, navigation: &Navigation<'_>, decision: &Decision) {
        let (to, requires_auth) = match decision {
            Decision::Proceed => (
                navigation.to.full_path.clone(),
                navigation.to.meta().requires_auth,
            ),
            Decision::Redirect(target) => (
                target.location.clone(),
                self.routes
                    .by_name(&target.name)
                    .map(|route| route.meta.requires_auth)
                    .unwrap_or_default(),
            ),
            Decision::Block => (
                navigation.from.full_path.clone(),
                navigation.from.meta().requires_auth,
            ),
        };

        self.audit.record(AuditEntry::RouteChange {
            timestamp: Utc::now(),
            from: navigation.from.full_path.clone(),
            to,
            requires_auth,
        });
    }

    /// on_error
    ///
    /// Router-level failure: the page for an allowed route could not be produced.
    /// Audits the failure and sends the user to the not-found page.
    pub fn on_error(&self, error: &RouterError, navigation: &Navigation<'_>) -> Decision {
        tracing::error!("Router error: {}", error);

        self.audit.record(AuditEntry::RouterError {
            timestamp: Utc::now(),
            from: navigation.from.path.clone(),
            to: navigation.to.path.clone(),
            error: error.to_string(),
        });

        self.redirect(NOT_FOUND, BTreeMap::new()).unwrap_or_else(|e| {
            tracing::error!("Cannot redirect to not-found: {}", e);
            Decision::Block
        })
    }

    fn redirect(
        &self,
        name: &str,
        query: BTreeMap<String, String>,
    ) -> Result<Decision, GuardError> {
        let route = self
            .routes
            .by_name(name)
            .ok_or_else(|| GuardError::UnknownRoute(name.to_string()))?;

        Ok(Decision::Redirect(RedirectTarget {
            name: route.name.to_string(),
            location: build_location(route.path, &query)?,
            query,
        }))
    }
}

/// Home of a signed-in user who opened a page hidden from them. Anything
/// that is not a doctor lands on the patient dashboard.
fn landing_for_signed_in(role: Role) -> &'static str {
    match role {
        Role::Doctor => DOCTOR_DASHBOARD,
        Role::Patient | Role::Unknown => PATIENT_DASHBOARD,
    }
}

/// Home of a user who opened a dashboard of another role. An unrecognized
/// role has no home and is sent to the unauthorized page.
fn landing_for_role_mismatch(role: Role) -> &'static str {
    match role {
        Role::Doctor => DOCTOR_DASHBOARD,
        Role::Patient => PATIENT_DASHBOARD,
        Role::Unknown => UNAUTHORIZED,
    }
}

/// Path plus form-encoded query, e.g. `/?redirect=%2Fprofile`.
fn build_location(path: &str, query: &BTreeMap<String, String>) -> Result<String, GuardError> {
    if query.is_empty() {
        return Ok(path.to_string());
    }

    let mut url = reqwest::Url::parse(LOCATION_BASE).map_err(|e| GuardError::InvalidLocation {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    url.set_path(path);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(match url.query() {
        Some(encoded) => format!("{}?{}", url.path(), encoded),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_fallbacks_differ_by_path() {
        assert_eq!(landing_for_signed_in(Role::Unknown), PATIENT_DASHBOARD);
        assert_eq!(landing_for_role_mismatch(Role::Unknown), UNAUTHORIZED);
    }

    #[test]
    fn location_encodes_query() {
        let query = BTreeMap::from([("redirect".to_string(), "/profile?tab=a b".to_string())]);
        let location = build_location("/", &query).unwrap();
        assert_eq!(location, "/?redirect=%2Fprofile%3Ftab%3Da+b");
        assert_eq!(build_location("/unauthorized", &BTreeMap::new()).unwrap(), "/unauthorized");
    }
}
