//! # Foodbank API Server
//!
//! Serves the foodbank operations API: clients, parcels, shopping lists,
//! printable documents and staff administration.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - JSON endpoints under `/v1`, guarded by JWT bearer tokens
//! - A live parcel table over SSE, driven by Postgres `LISTEN/NOTIFY`
//! - Database migrations applied at startup
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p foodbank-api
//! ```

use foodbank_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use foodbank_shared::{
    db::{
        migrations::run_migrations,
        pool::{create_pool, PoolConfig},
    },
    realtime::listen_for_changes,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "foodbank_api=debug,foodbank_shared=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        "Foodbank API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let mut pool_config = PoolConfig::new(config.database.url.clone());
    pool_config.max_connections = config.database.max_connections;
    let pool = create_pool(pool_config).await?;

    run_migrations(&pool).await?;

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config);

    let listener_task = tokio::spawn(listen_for_changes(
        pool,
        state.hub.clone(),
        state.shutdown.clone(),
    ));

    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Covers serve returning without a signal
    shutdown.cancel();
    listener_task.await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, closing live streams...");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
