use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_feed::config::Config;
use portfolio_feed::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_feed=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("PORTFOLIO_CONFIG").unwrap_or_else(|_| "site.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded configuration from {} (feed: {})",
        config_path, config.substack.feed_url
    );

    let state = Arc::new(AppState::new(config.substack)?);
    if !state.adapter.is_allowed(&state.substack.feed_url) {
        info!("Feed URL is not a recognized provider; /api/substack will return no posts");
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
