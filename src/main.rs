use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plenary_votes::config::Config;
use plenary_votes::routes::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plenary_votes=debug,plenary_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr = config.listen_addr();
    tracing::info!(
        upstream = %config.upstream_base_url,
        retention_secs = config.cache_ttl_secs,
        max_entries = config.cache_max_entries,
        "Cache configured"
    );

    let state = AppState::from_config(config)?;

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Proxy server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
