use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutorhub::{
    build_router,
    config::{
        session::{session_store, validate_production_config, SessionConfig},
        Settings,
    },
    db, services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorhub=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    validate_production_config()?;

    // Database connection
    let pool = db::create_pool(&settings.database_url)
        .await
        .context("failed to open database")?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let email_service: Arc<dyn services::EmailService> =
        Arc::from(services::create_email_service());
    let app_state = AppState::new(pool.clone(), email_service, settings.verification());

    // Session store
    let store = session_store(pool).await?;
    let session_layer = SessionConfig::from_env().create_layer(store);

    let app = build_router(app_state, session_layer);

    let addr = settings.socket_addr();
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
