//! Server entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use providers::{GeminiClient, GooglePlaceClient, ReviewServiceClient};
use scorer_client::ScorerClient;
use server::{router, AppState, Config, SessionDeps};
use storage::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,engine=debug,providers=debug".into()),
        )
        .init();

    let config = Config::parse();
    info!("Starting recommendation server on {}", config.bind_addr);

    info!("Opening database {}", config.database_url);
    let store = Store::connect(&config.database_url).await?;

    info!("Connecting to scoring service at {}", config.scorer_addr);
    let scorer = ScorerClient::connect(config.scorer_addr.clone()).await?;

    let deps = SessionDeps {
        places: Arc::new(GooglePlaceClient::new(config.google_maps_api_key.clone())),
        reviews: Arc::new(ReviewServiceClient::new(config.review_service_url.clone())),
        generator: Arc::new(GeminiClient::new(config.gemini_api_key.clone())),
        scorer: Arc::new(scorer),
        store,
    };

    let state = AppState {
        deps,
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
