use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use evmarket_rust::{
    AppState, config::Settings, events::EventBus, marketplace_api::HttpMarketplaceApi, routes,
};

// Logs every marketplace event until the bus is dropped
fn spawn_event_logger(events: &EventBus) {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => tracing::info!(?event, "Marketplace event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event logger lagged, skipped {} event(s)", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evmarket_rust=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing EV marketplace gateway...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    let addr: SocketAddr = settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address '{}'", settings.server_address))?;

    // One client shared by every upstream call; it picks up HTTP(S)_PROXY from the environment
    let http_client = Arc::new(
        Client::builder()
            .user_agent(concat!("evmarket_rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build shared reqwest client")?,
    );
    let api = HttpMarketplaceApi::new(http_client, settings.api_base_url.clone());
    tracing::info!("Using marketplace API at {}", api.base_url());

    let app_state = AppState::new(settings, Arc::new(api));
    spawn_event_logger(&app_state.events);

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
