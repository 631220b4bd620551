use clinic_portal::{
    MemoryAuditSink, MockAuthProvider, NavigationGuard, RouteTable,
    auth::SessionCredentials,
    guard::GuardOutcome,
    models::{AuditEntry, Decision},
    routes::{
        self, DOCTOR_DASHBOARD, LOGIN, NOT_FOUND, PATIENT_DASHBOARD, RouteDefinition,
        RouteMeta, UNAUTHORIZED,
    },
    views::RouterError,
};
use std::sync::Arc;

const APP_NAME: &str = "Clinic Portal";

// --- Helpers ---

fn guard_with(
    provider: Arc<MockAuthProvider>,
    routes: RouteTable,
) -> (NavigationGuard, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = NavigationGuard::new(provider, audit.clone(), Arc::new(routes), APP_NAME);
    (guard, audit)
}

fn standard_guard(provider: Arc<MockAuthProvider>) -> (NavigationGuard, Arc<MemoryAuditSink>) {
    guard_with(provider, RouteTable::standard())
}

async fn decide(guard: &NavigationGuard, to: &str, from: &str) -> GuardOutcome {
    let credentials = SessionCredentials::default();
    let navigation = guard.navigation(to, from, &credentials, Some("test-agent/1.0"));
    guard.before_each(&navigation).await
}

fn assert_redirect(decision: &Decision, expected: &str) {
    assert_eq!(
        decision.redirect_name(),
        Some(expected),
        "expected redirect to {expected}, got {decision:?}"
    );
}

// --- Scenarios ---

#[tokio::test]
async fn test_anonymous_doctor_dashboard_redirects_to_login_with_return_path() {
    let (guard, _) = standard_guard(Arc::new(MockAuthProvider::anonymous()));

    let outcome = decide(&guard, "/doctor-dashboard", "/").await;

    let Decision::Redirect(target) = &outcome.decision else {
        panic!("expected a redirect, got {:?}", outcome.decision);
    };
    assert_eq!(target.name, LOGIN);
    assert_eq!(target.query.get("redirect").map(String::as_str), Some("/doctor-dashboard"));
    assert_eq!(target.location, "/?redirect=%2Fdoctor-dashboard");
    assert!(!outcome.signed_out);
}

#[tokio::test]
async fn test_signed_in_patient_on_login_goes_to_patient_dashboard() {
    let (guard, _) = standard_guard(Arc::new(MockAuthProvider::signed_in(Some("Patient"))));

    let outcome = decide(&guard, "/", "/").await;

    assert_redirect(&outcome.decision, PATIENT_DASHBOARD);
}

#[tokio::test]
async fn test_doctor_on_patient_dashboard_goes_to_doctor_dashboard() {
    let (guard, _) = standard_guard(Arc::new(MockAuthProvider::signed_in(Some("Doctor"))));

    let outcome = decide(&guard, "/patient-dashboard", "/").await;

    assert_redirect(&outcome.decision, DOCTOR_DASHBOARD);
}

#[tokio::test]
async fn test_profile_proceeds_without_profile_lookup() {
    let provider = Arc::new(MockAuthProvider::signed_in(Some("Patient")));
    let (guard, _) = standard_guard(provider.clone());

    let outcome = decide(&guard, "/profile", "/patient-dashboard").await;

    assert_eq!(outcome.decision, Decision::Proceed);
    assert_eq!(provider.profile_lookups(), 0);
    assert_eq!(outcome.document_title.as_deref(), Some("Profile | Clinic Portal"));
}

#[tokio::test]
async fn test_profile_failure_on_role_gated_route_is_unauthorized() {
    let provider = Arc::new(MockAuthProvider::signed_in(Some("Doctor")).with_failing_profile());
    let (guard, _) = standard_guard(provider);

    let outcome = decide(&guard, "/doctor-dashboard", "/").await;

    assert_redirect(&outcome.decision, UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_failure_signs_out_and_redirects_to_login_on_every_route() {
    for route in RouteTable::standard().routes() {
        let provider = Arc::new(MockAuthProvider::failing_session());
        let (guard, _) = standard_guard(provider.clone());

        let outcome = decide(&guard, route.path, "/").await;

        assert_redirect(&outcome.decision, LOGIN);
        assert!(outcome.signed_out, "session not discarded for {}", route.name);
        assert_eq!(provider.sign_outs(), 1);
    }
}

// --- Properties ---

#[tokio::test]
async fn test_protected_routes_always_send_anonymous_users_to_login() {
    let table = RouteTable::standard();
    let (guard, _) = standard_guard(Arc::new(MockAuthProvider::anonymous()));

    for route in table.routes().iter().filter(|r| r.meta.requires_auth) {
        let requested = format!("{}?tab=history", route.path);
        let outcome = decide(&guard, &requested, "/").await;

        let Decision::Redirect(target) = &outcome.decision else {
            panic!("{} let an anonymous user through", route.name);
        };
        assert_eq!(target.name, LOGIN);
        assert_eq!(target.query.get("redirect"), Some(&requested));
    }
}

#[tokio::test]
async fn test_hidden_routes_never_proceed_for_signed_in_users() {
    let table = RouteTable::standard();
    let roles = [Some("Doctor"), Some("Patient"), Some("Nurse"), None];

    for role in roles {
        let (guard, _) = standard_guard(Arc::new(MockAuthProvider::signed_in(role)));

        for route in table.routes().iter().filter(|r| r.meta.hide_for_auth) {
            let outcome = decide(&guard, route.path, "/").await;
            let expected = if role == Some("Doctor") {
                DOCTOR_DASHBOARD
            } else {
                PATIENT_DASHBOARD
            };
            assert_redirect(&outcome.decision, expected);
        }
    }
}

#[tokio::test]
async fn test_hidden_route_profile_failure_defaults_to_patient_dashboard() {
    let provider = Arc::new(MockAuthProvider::signed_in(Some("Doctor")).with_failing_profile());
    let (guard, _) = standard_guard(provider);

    let outcome = decide(&guard, "/register", "/").await;

    assert_redirect(&outcome.decision, PATIENT_DASHBOARD);
}

#[tokio::test]
async fn test_role_mismatch_never_proceeds() {
    let table = RouteTable::standard();
    let profile_roles = [Some("Doctor"), Some("Patient"), Some("doctor"), Some("Admin"), None];

    for route in table.routes().iter().filter(|r| r.meta.role.is_some()) {
        let required = route.meta.role.map(|role| role.as_str());

        for role in profile_roles.iter().filter(|role| **role != required) {
            let (guard, _) = standard_guard(Arc::new(MockAuthProvider::signed_in(*role)));
            let outcome = decide(&guard, route.path, "/").await;

            let expected = match *role {
                Some("Doctor") => DOCTOR_DASHBOARD,
                Some("Patient") => PATIENT_DASHBOARD,
                _ => UNAUTHORIZED,
            };
            assert_redirect(&outcome.decision, expected);
        }
    }
}

#[tokio::test]
async fn test_matching_role_proceeds() {
    let (guard, _) = standard_guard(Arc::new(MockAuthProvider::signed_in(Some("Doctor"))));

    let outcome = decide(&guard, "/doctor-dashboard", "/").await;

    assert_eq!(outcome.decision, Decision::Proceed);
    assert_eq!(
        outcome.document_title.as_deref(),
        Some("Doctor Dashboard | Clinic Portal")
    );
}

#[tokio::test]
async fn test_guard_is_idempotent() {
    let provider = Arc::new(MockAuthProvider::signed_in(Some("Patient")));
    let (guard, _) = standard_guard(provider.clone());

    for path in ["/", "/doctor-dashboard", "/patient-dashboard", "/profile", "/missing"] {
        let first = decide(&guard, path, "/").await;
        let second = decide(&guard, path, "/").await;
        assert_eq!(first, second, "different decisions for {path}");
    }
}

#[tokio::test]
async fn test_profile_failure_on_every_role_gated_route_is_unauthorized() {
    let table = RouteTable::standard();

    for route in table.routes().iter().filter(|r| r.meta.role.is_some()) {
        for role in [Some("Doctor"), Some("Patient")] {
            let provider = Arc::new(MockAuthProvider::signed_in(role).with_failing_profile());
            let (guard, _) = standard_guard(provider);

            let outcome = decide(&guard, route.path, "/").await;
            assert_redirect(&outcome.decision, UNAUTHORIZED);
        }
    }
}

#[tokio::test]
async fn test_internal_error_on_login_blocks_instead_of_looping() {
    let provider = Arc::new(MockAuthProvider::failing_session().with_failing_sign_out());
    let (guard, audit) = standard_guard(provider);

    let outcome = decide(&guard, "/", "/profile").await;

    assert_eq!(outcome.decision, Decision::Block);
    // The local session is discarded even though the remote sign-out failed.
    assert!(outcome.signed_out);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        AuditEntry::NavigationError {
            from,
            to,
            error,
            user_agent,
            ..
        } => {
            assert_eq!(from, "/profile");
            assert_eq!(to, "/");
            assert!(error.contains("sign-out"));
            assert_eq!(user_agent.as_deref(), Some("test-agent/1.0"));
        }
        other => panic!("unexpected audit entry {other:?}"),
    }
}

#[tokio::test]
async fn test_internal_error_elsewhere_redirects_to_login() {
    let provider = Arc::new(MockAuthProvider::failing_session().with_failing_sign_out());
    let (guard, audit) = standard_guard(provider);

    let outcome = decide(&guard, "/profile", "/").await;

    assert_redirect(&outcome.decision, LOGIN);
    assert!(matches!(
        audit.entries().as_slice(),
        [AuditEntry::NavigationError { .. }]
    ));
}

#[tokio::test]
async fn test_missing_redirect_target_is_an_internal_error() {
    // A table without the unauthorized page: the fail-safe redirect cannot be built.
    let mut definitions = routes::public::public_routes();
    definitions.retain(|route| route.name != UNAUTHORIZED);
    definitions.extend(routes::authenticated::authenticated_routes());
    definitions.push(routes::public::not_found_route());
    let table = RouteTable::new(definitions).expect("valid table");

    let provider = Arc::new(MockAuthProvider::signed_in(Some("Doctor")).with_failing_profile());
    let (guard, audit) = guard_with(provider, table);

    let outcome = decide(&guard, "/doctor-dashboard", "/").await;

    assert_redirect(&outcome.decision, LOGIN);
    assert_eq!(audit.entries().len(), 1);
}

// --- Hooks ---

#[tokio::test]
async fn test_after_each_records_final_destination() {
    let (guard, audit) = standard_guard(Arc::new(MockAuthProvider::anonymous()));
    let credentials = SessionCredentials::default();

    let allowed = guard.navigation("/unauthorized", "/", &credentials, None);
    guard.after_each(&allowed, &Decision::Proceed);

    let redirected = guard.navigation("/profile?tab=1", "/register", &credentials, None);
    let outcome = guard.before_each(&redirected).await;
    guard.after_each(&redirected, &outcome.decision);

    let blocked = guard.navigation("/", "/profile", &credentials, None);
    guard.after_each(&blocked, &Decision::Block);

    let entries = audit.entries();
    let summary: Vec<(String, String, bool)> = entries
        .iter()
        .map(|entry| match entry {
            AuditEntry::RouteChange {
                from,
                to,
                requires_auth,
                ..
            } => (from.clone(), to.clone(), *requires_auth),
            other => panic!("unexpected audit entry {other:?}"),
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            ("/".to_string(), "/unauthorized".to_string(), false),
            (
                "/register".to_string(),
                "/?redirect=%2Fprofile%3Ftab%3D1".to_string(),
                false
            ),
            ("/profile".to_string(), "/profile".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_on_error_redirects_to_not_found_and_audits() {
    let (guard, audit) = standard_guard(Arc::new(MockAuthProvider::anonymous()));
    let credentials = SessionCredentials::default();
    let navigation = guard.navigation("/profile", "/", &credentials, None);

    let decision = guard.on_error(&RouterError::ViewNotFound("profile".to_string()), &navigation);

    let Decision::Redirect(target) = &decision else {
        panic!("expected a redirect, got {decision:?}");
    };
    assert_eq!(target.name, NOT_FOUND);
    assert_eq!(target.location, "/not-found");
    assert!(matches!(
        audit.entries().as_slice(),
        [AuditEntry::RouterError { .. }]
    ));
}

#[tokio::test]
async fn test_custom_role_route_uses_route_meta() {
    let mut definitions = routes::public::public_routes();
    definitions.extend(routes::authenticated::authenticated_routes());
    definitions.push(RouteDefinition::new(
        "/prescriptions",
        "prescriptions",
        RouteMeta {
            requires_auth: true,
            role: Some(clinic_portal::models::Role::Doctor),
            title: Some("Prescriptions"),
            ..RouteMeta::default()
        },
    ));
    definitions.push(routes::public::not_found_route());
    let table = RouteTable::new(definitions).expect("valid table");

    let (guard, _) = guard_with(
        Arc::new(MockAuthProvider::signed_in(Some("Patient"))),
        table,
    );

    let outcome = decide(&guard, "/prescriptions", "/").await;
    assert_redirect(&outcome.decision, PATIENT_DASHBOARD);

    let outcome = decide(&guard, "/Profile/", "/").await;
    assert_eq!(outcome.decision, Decision::Proceed);
}
