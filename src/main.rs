use std::sync::Arc;

use cosmoview::config::ServerConfig;
use cosmoview::routes;
use cosmoview::skyview::SkyViewClient;
use cosmoview::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server configuration");

    let skyview = SkyViewClient::new(
        &config.skyview_url,
        &config.output_dir,
        config.timeouts.request(),
        config.timeouts.connect(),
    )
    .expect("SkyView client init failed");

    if !config.web_dir.is_dir() {
        tracing::warn!(web_dir = %config.web_dir.display(), "web directory missing — /app will answer 404");
    }

    let state = AppState::new(Arc::new(skyview), &config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, output_dir = %config.output_dir.display(), "cosmoview tile proxy listening");
    axum::serve(listener, app).await.expect("server failed");
}
