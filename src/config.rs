use std::env;
use std::time::Duration;

/// Fallback JWT secret for local development only.
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// immutable afterwards; pulled into handlers via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev bypass and error detail exposure.
    pub env: Env,
    // Supabase project URL. Missing is a startup warning, not a failure.
    pub supabase_url: Option<String>,
    // Supabase anon (public) API key, sent as `apikey` on every provider call.
    pub supabase_anon_key: Option<String>,
    // Secret used to verify session access tokens (Supabase-managed).
    pub jwt_secret: String,
    // Suffix of every document title, e.g. "Login | Clinic Portal".
    pub app_name: String,
    pub bind_addr: String,
    // Cookie carrying the session access token when no Authorization header is sent.
    pub session_cookie: String,
    // Upper bound on every call to the auth provider.
    pub provider_timeout: Duration,
}

/// Env
///
/// Runtime context. `Local` enables the `x-user-id` bypass and surfaces router errors.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests. No provider endpoint is configured.
    fn default() -> Self {
        Self {
            env: Env::Local,
            supabase_url: None,
            supabase_anon_key: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            app_name: "Clinic Portal".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            session_cookie: "supabase.auth.token".to_string(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `SUPABASE_JWT_SECRET` is not set: without it no
    /// session can be verified and every protected page would be unreachable.
    pub fn load() -> Self {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => env::var("SUPABASE_JWT_SECRET")
                .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
            Env::Local => {
                env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
            }
        };

        let provider_timeout = env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.provider_timeout);

        Self {
            env,
            supabase_url: non_empty_var(&["SUPABASE_URL", "VITE_SUPABASE_URL"])
                .map(|url| url.trim_end_matches('/').to_string()),
            supabase_anon_key: non_empty_var(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]),
            jwt_secret,
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            session_cookie: env::var("SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            provider_timeout,
        }
    }

    /// Names of the provider settings that are absent.
    pub fn missing_provider_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase_url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase_anon_key.is_none() {
            missing.push("SUPABASE_ANON_KEY");
        }
        missing
    }

    /// Logs a warning for every missing provider setting. Call after logging is initialized.
    pub fn warn_missing_provider_settings(&self) {
        for name in self.missing_provider_settings() {
            tracing::warn!(
                "Missing Supabase environment variable {}; profile lookups and sign-out are disabled",
                name
            );
        }
    }
}

/// Returns the first of `names` that is set to a non-blank value.
fn non_empty_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}
