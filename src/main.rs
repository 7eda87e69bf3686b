use fieldwatch::{
    config::{validate_production_config, AppConfig, SessionConfig},
    db, routes,
    services::create_email_service,
    AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fieldwatch=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    validate_production_config()?;
    let config = AppConfig::from_env()?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Database connection
    let pool = db::create_pool().await?;
    db::migrate(&pool).await?;

    // Session store
    let session_store = SqliteStore::new(pool.clone()).with_table_name("sessions")?;
    session_store.migrate().await?;
    let session_layer = SessionConfig::from_env().create_layer(session_store);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let email_service = Arc::from(create_email_service());
    let (app_state, runner) = AppState::build(config, pool, email_service);

    let app = routes::build_router(app_state, session_layer);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue handles; wait for queued jobs to finish
    tracing::info!("Draining background jobs");
    runner.join().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
