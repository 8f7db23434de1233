//! OpenSASE Cart - storefront cart gateway

use std::sync::Arc;

use anyhow::Result;
use opensase_cart::api;
use opensase_cart::config::Config;
use opensase_cart::domain::loyalty::SpendPerCoin;
use opensase_cart::infrastructure::{FileStore, HttpRemoteCart};
use opensase_cart::service::CartRegistry;
use opensase_cart::telemetry::{TelemetryWorker, Tracker};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, cart events will only be logged");
                None
            }
        },
        None => None,
    };

    let shutdown = CancellationToken::new();
    let (tracker, events) = Tracker::channel(config.telemetry_buffer);
    let telemetry = tokio::spawn(TelemetryWorker::new(nats, config.events_subject.clone()).run(events, shutdown.child_token()));

    let remote = Arc::new(HttpRemoteCart::new(config.cart_api_url.clone(), config.cart_api_timeout)?);
    let local = Arc::new(FileStore::open(&config.local_store_dir)?);
    let loyalty = Arc::new(SpendPerCoin::new(config.loyalty_spend_per_coin));
    let registry = Arc::new(CartRegistry::new(remote, local, tracker, loyalty, config.cart_mailbox, config.cart_idle_timeout, shutdown.child_token()));

    let app = api::router(registry.clone()).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

    tracing::info!("🚀 OpenSASE Cart listening on 0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    registry.shutdown();
    shutdown.cancel();
    let _ = telemetry.await;
    Ok(())
}
