use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::{ProfileRow, Role, Session},
};

/// Audience Supabase puts in the access tokens of signed-in users.
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// Sent as `X-Client-Info` on every provider call.
const CLIENT_INFO: &str = "clinic-portal";

/// Claims
///
/// Payload of a Supabase access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, also the primary key of `public.profiles`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid session token: {0}")]
    InvalidSession(String),
    #[error("auth provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("auth provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("no profile found for user {0}")]
    ProfileNotFound(Uuid),
    #[error("auth provider is not configured")]
    NotConfigured,
}

/// SessionCredentials
///
/// Whatever the request carries that may prove a session. Extracting it never fails;
/// deciding whether it is valid is the `AuthProvider`'s job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCredentials {
    /// Bearer token, or the session cookie when no Authorization header is sent.
    pub access_token: Option<String>,
    /// Local development bypass (`x-user-id`). Only populated in `Env::Local`.
    pub dev_user_id: Option<Uuid>,
}

impl SessionCredentials {
    pub fn from_headers(headers: &HeaderMap, config: &AppConfig) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        let access_token = bearer.or_else(|| {
            CookieJar::from_headers(headers)
                .get(&config.session_cookie)
                .map(|cookie| cookie.value().to_string())
                .filter(|token| !token.is_empty())
        });

        // The bypass header is ignored outside local development.
        let dev_user_id = match config.env {
            Env::Local => headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok()),
            Env::Production => None,
        };

        Self {
            access_token,
            dev_user_id,
        }
    }
}

impl<S> FromRequestParts<S> for SessionCredentials
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &config))
    }
}

/// AuthProvider
///
/// The external backend-as-a-service as seen by the navigation guard: a session lookup,
/// a profile role lookup, and sign-out. Implementations absorb nothing; every failure is
/// reported and the guard turns it into a navigation decision.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves the current session. `Ok(None)` means "not signed in".
    async fn get_session(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Session>, AuthError>;

    /// Reads the role of the session's user from the `profiles` table.
    async fn get_profile_role(&self, session: &Session) -> Result<Role, AuthError>;

    /// Destroys the session on the provider side.
    async fn sign_out(&self, credentials: &SessionCredentials) -> Result<(), AuthError>;
}

/// AuthProviderState
///
/// The shared handle injected into the navigation guard.
pub type AuthProviderState = Arc<dyn AuthProvider>;

/// SupabaseAuthProvider
///
/// Sessions are verified locally against the project JWT secret; profiles and
/// sign-out go through the Supabase REST and Auth endpoints.
#[derive(Clone)]
pub struct SupabaseAuthProvider {
    client: reqwest::Client,
    url: Option<String>,
    anon_key: Option<String>,
    jwt_secret: String,
}

impl SupabaseAuthProvider {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-client-info",
            reqwest::header::HeaderValue::from_static(CLIENT_INFO),
        );

        let client = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
        })
    }

    fn endpoint(&self) -> Option<(&str, &str)> {
        Some((self.url.as_deref()?, self.anon_key.as_deref()?))
    }

    /// Decodes and validates an access token. An expired token is an absent session.
    fn verify_token(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_audience(&[SUPABASE_AUDIENCE]);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Ok(Some(Session {
                user_id: data.claims.sub,
                email: data.claims.email,
                access_token: Some(token.to_string()),
            })),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Session token expired; treating as signed out");
                    Ok(None)
                }
                _ => Err(AuthError::InvalidSession(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn get_session(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Session>, AuthError> {
        if let Some(user_id) = credentials.dev_user_id {
            return Ok(Some(Session {
                user_id,
                email: None,
                access_token: None,
            }));
        }

        match credentials.access_token.as_deref() {
            Some(token) => self.verify_token(token),
            None => Ok(None),
        }
    }

    async fn get_profile_role(&self, session: &Session) -> Result<Role, AuthError> {
        let (url, anon_key) = self.endpoint().ok_or(AuthError::NotConfigured)?;
        // Row-level security needs the user's own token; the bypass session has none.
        let bearer = session.access_token.as_deref().unwrap_or(anon_key);

        let response = self
            .client
            .get(format!("{}/rest/v1/profiles", url))
            .query(&[
                ("select", "role".to_string()),
                ("id", format!("eq.{}", session.user_id)),
            ])
            .header("apikey", anon_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", bearer))
            // Single-object response: PostgREST answers 406 unless exactly one row matches.
            .header(reqwest::header::ACCEPT, "application/vnd.pgrst.object+json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_ACCEPTABLE {
            return Err(AuthError::ProfileNotFound(session.user_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let row = response.json::<ProfileRow>().await?;
        Ok(Role::from_profile(row.role.as_deref()))
    }

    async fn sign_out(&self, credentials: &SessionCredentials) -> Result<(), AuthError> {
        let Some(token) = credentials.access_token.as_deref() else {
            return Ok(());
        };
        let Some((url, anon_key)) = self.endpoint() else {
            tracing::debug!("Supabase not configured; skipping remote sign-out");
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/auth/v1/logout", url))
            .query(&[("scope", "local")])
            .header("apikey", anon_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        // The session is already gone on the provider side; nothing left to revoke.
        let already_signed_out = matches!(status.as_u16(), 401 | 403 | 404);
        if status.is_success() || already_signed_out {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Provider {
            status: status.as_u16(),
            body,
        })
    }
}

// --- Mock Implementation (For Tests) ---

/// MockSession
///
/// Scripted answer of `MockAuthProvider::get_session`.
#[derive(Debug, Clone)]
pub enum MockSession {
    Absent,
    Present(Session),
    Failing,
}

/// MockAuthProvider
///
/// Scripted `AuthProvider` used to exercise the guard without a network. Counts
/// profile lookups and sign-outs so tests can assert which provider calls happened.
#[derive(Debug)]
pub struct MockAuthProvider {
    session: MockSession,
    role: Option<String>,
    fail_profile: bool,
    fail_sign_out: bool,
    profile_lookups: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl MockAuthProvider {
    fn with_session(session: MockSession) -> Self {
        Self {
            session,
            role: None,
            fail_profile: false,
            fail_sign_out: false,
            profile_lookups: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn anonymous() -> Self {
        Self::with_session(MockSession::Absent)
    }

    /// A signed-in user whose profile carries `role` (raw column value, `None` for null).
    pub fn signed_in(role: Option<&str>) -> Self {
        let mut provider = Self::with_session(MockSession::Present(Session {
            user_id: Uuid::from_u128(1),
            email: Some("user@example.com".to_string()),
            access_token: Some("mock-access-token".to_string()),
        }));
        provider.role = role.map(str::to_string);
        provider
    }

    pub fn failing_session() -> Self {
        Self::with_session(MockSession::Failing)
    }

    pub fn with_failing_profile(mut self) -> Self {
        self.fail_profile = true;
        self
    }

    pub fn with_failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub fn profile_lookups(&self) -> usize {
        self.profile_lookups.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_session(
        &self,
        _credentials: &SessionCredentials,
    ) -> Result<Option<Session>, AuthError> {
        match &self.session {
            MockSession::Absent => Ok(None),
            MockSession::Present(session) => Ok(Some(session.clone())),
            MockSession::Failing => Err(AuthError::Provider {
                status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                body: "Mock Auth Error: Simulation requested".to_string(),
            }),
        }
    }

    async fn get_profile_role(&self, session: &Session) -> Result<Role, AuthError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile {
            return Err(AuthError::ProfileNotFound(session.user_id));
        }
        Ok(Role::from_profile(self.role.as_deref()))
    }

    async fn sign_out(&self, _credentials: &SessionCredentials) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(AuthError::Provider {
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                body: "Mock Auth Error: sign-out failed".to_string(),
            });
        }
        Ok(())
    }
}
