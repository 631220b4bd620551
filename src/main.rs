use clinic_portal::{
    AppState, RouteTable, SupabaseAuthProvider, TracingAuditSink,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, wires the Supabase-backed navigation
/// guard into the router, and serves the shell.
#[tokio::main]
async fn main() {
    // 1. Configuration
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose defaults for the app.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clinic_portal=debug,audit=info,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator; audit records travel the same way.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // A missing provider endpoint degrades profile checks; it does not stop startup.
    config.warn_missing_provider_settings();

    // 3. Auth provider and audit sink
    let provider = SupabaseAuthProvider::new(&config)
        .expect("FATAL: Failed to build the Supabase HTTP client.");

    let app_state = AppState::new(
        config.clone(),
        Arc::new(provider),
        Arc::new(TracingAuditSink),
        RouteTable::standard(),
    );

    // 4. Router and server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://{}/swagger-ui",
        config.bind_addr
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {:?}", e);
    }
}
