use anyhow::Result;
use sr_core::Config;
use sr_server::{AppState, SERVER_LOG_DIRECTIVES, SharedState, build_router, init_tracing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(SERVER_LOG_DIRECTIVES).map_err(|e| anyhow::anyhow!(e))?;

    let config = Config::load_default()?;
    let state: SharedState = Arc::new(AppState::from_config(&config)?);

    tracing::info!(
        dimensions = config.index.dimensions,
        vector_timeout_ms = config.search.vector_timeout_ms,
        on_disk = config.data_dir().is_some(),
        "indices ready"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("searchrank query server starting on {addr}");

    let app = build_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
