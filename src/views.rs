use crate::routes::{
    DOCTOR_DASHBOARD, LOGIN, NOT_FOUND, PATIENT_DASHBOARD, PROFILE, REGISTER, ResolvedRoute,
    UNAUTHORIZED,
};
use crate::models::PageView;

/// Failure of the routing layer itself, as opposed to an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("no view registered for route {0}")]
    ViewNotFound(String),
}

/// View
///
/// The client-side component that renders each route of the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    DoctorDashboard,
    PatientDashboard,
    Profile,
    Unauthorized,
    NotFound,
}

impl View {
    /// Looks up the view for a route name. A route without a view is a router error.
    pub fn for_route(name: &str) -> Result<Self, RouterError> {
        match name {
            LOGIN => Ok(View::Login),
            REGISTER => Ok(View::Register),
            DOCTOR_DASHBOARD => Ok(View::DoctorDashboard),
            PATIENT_DASHBOARD => Ok(View::PatientDashboard),
            PROFILE => Ok(View::Profile),
            UNAUTHORIZED => Ok(View::Unauthorized),
            NOT_FOUND => Ok(View::NotFound),
            other => Err(RouterError::ViewNotFound(other.to_string())),
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            View::Login => "LoginView",
            View::Register => "RegisterView",
            View::DoctorDashboard => "DoctorDashboard",
            View::PatientDashboard => "PatientDashboard",
            View::Profile => "ProfileView",
            View::Unauthorized => "UnauthorizedView",
            View::NotFound => "NotFoundView",
        }
    }

    pub fn page(&self, route: &ResolvedRoute<'_>, document_title: Option<String>) -> PageView {
        PageView {
            route: route.name().to_string(),
            component: self.component().to_string(),
            path: route.path.clone(),
            full_path: route.full_path.clone(),
            document_title,
        }
    }
}
