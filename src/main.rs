use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendtool::aggregator::Aggregator;
use trendtool::config::Config;
use trendtool::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trendtool=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("TRENDTOOL_CONFIG").unwrap_or_else(|_| "trendtool.toml".to_string());
    let config = Config::load(&config_path)?;
    let settings = config.settings();
    info!(
        path = %config_path,
        use_proxy = settings.use_proxy,
        limit = settings.limit,
        "Loaded configuration"
    );

    let aggregator = Arc::new(Aggregator::from_config(&config, &settings)?);

    // Warm the cache so the first page load is fast
    let warm = aggregator.clone();
    let warm_settings = settings.clone();
    tokio::spawn(async move {
        info!("Starting initial fetch");
        let _ = warm.refresh(&warm_settings).await;
    });

    let state = Arc::new(AppState {
        aggregator,
        settings,
    });

    // Build router
    let app = Router::new()
        .route("/", get(routes::index))
        .route("/refresh", post(routes::refresh))
        .route("/refresh/status", get(routes::refresh_status))
        .route("/api/items", get(routes::items))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Server starting on http://{}", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
