use std::sync::Arc;

use qrmenu_api::{build_router, state::AppState};
use qrmenu_config::{Settings, StoreBackend};
use qrmenu_db::{connect, indexes::ensure_indexes};
use qrmenu_services::{ConnectionRegistry, realtime::{CloseReason, StaticMembership}};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "qrmenu_api=debug,qrmenu_services=debug,qrmenu_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(
        "Starting QR Menu notification API on {}:{}",
        settings.app.host, settings.app.port
    );

    let app_state = match settings.database.backend {
        StoreBackend::Mongo => {
            let db = connect(&settings).await?;
            ensure_indexes(&db).await?;
            AppState::new(db, settings.clone())
        }
        StoreBackend::Memory => {
            warn!("Using in-memory notification store; nothing is persisted");
            AppState::in_memory(settings.clone(), Arc::new(StaticMembership::new()))
        }
    };

    let registry = app_state.registry.clone();
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(%e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    registry.close_all(CloseReason::ServerShutdown);
}
