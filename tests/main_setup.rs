use clinic_portal::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic, time::Duration};

const CONFIG_VARS: [&str; 10] = [
    "APP_ENV",
    "SUPABASE_URL",
    "VITE_SUPABASE_URL",
    "SUPABASE_ANON_KEY",
    "VITE_SUPABASE_ANON_KEY",
    "SUPABASE_JWT_SECRET",
    "APP_NAME",
    "BIND_ADDR",
    "SESSION_COOKIE",
    "PROVIDER_TIMEOUT_SECS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with every config variable cleared, then restores the environment.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("SUPABASE_URL", "https://project.supabase.co");
            }
            // SUPABASE_JWT_SECRET is missing
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic on a missing JWT secret"
    );
}

#[test]
#[serial]
fn test_app_config_production_with_secret() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("SUPABASE_JWT_SECRET", "prod-secret");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "local");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.jwt_secret, "super-secure-test-secret-value-local");
    assert_eq!(config.app_name, "Clinic Portal");
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.session_cookie, "supabase.auth.token");
    assert_eq!(config.provider_timeout, Duration::from_secs(10));
    assert_eq!(config.supabase_url, None);
    assert_eq!(
        config.missing_provider_settings(),
        vec!["SUPABASE_URL", "SUPABASE_ANON_KEY"]
    );
}

#[test]
#[serial]
fn test_app_config_reads_vite_fallbacks() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("VITE_SUPABASE_URL", "https://project.supabase.co/");
            env::set_var("VITE_SUPABASE_ANON_KEY", "vite-anon");
            // Blank values do not shadow the fallback.
            env::set_var("SUPABASE_ANON_KEY", "  ");
        }
        AppConfig::load()
    });

    assert_eq!(
        config.supabase_url.as_deref(),
        Some("https://project.supabase.co")
    );
    assert_eq!(config.supabase_anon_key.as_deref(), Some("vite-anon"));
    assert!(config.missing_provider_settings().is_empty());
}

#[test]
#[serial]
fn test_app_config_primary_names_win() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("SUPABASE_URL", "https://primary.supabase.co");
            env::set_var("VITE_SUPABASE_URL", "https://vite.supabase.co");
            env::set_var("APP_NAME", "Health Hub");
            env::set_var("PROVIDER_TIMEOUT_SECS", "3");
        }
        AppConfig::load()
    });

    assert_eq!(
        config.supabase_url.as_deref(),
        Some("https://primary.supabase.co")
    );
    assert_eq!(config.app_name, "Health Hub");
    assert_eq!(config.provider_timeout, Duration::from_secs(3));
    assert_eq!(config.missing_provider_settings(), vec!["SUPABASE_ANON_KEY"]);
}

#[test]
#[serial]
fn test_app_config_ignores_bad_timeout() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("PROVIDER_TIMEOUT_SECS", "soon");
        }
        AppConfig::load()
    });

    assert_eq!(config.provider_timeout, Duration::from_secs(10));
}
