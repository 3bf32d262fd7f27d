pub mod response;

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::{middleware, shutdown};

/// Application router with all routes and middleware
pub fn create_router(state: FeatureState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(features::router(state))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serve until a shutdown signal, then drain connections for at most the
/// configured shutdown timeout
pub async fn serve(config: Config, state: FeatureState) -> anyhow::Result<()> {
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown::signal() => {}
    }

    let _ = stop_tx.send(());
    let timeout_secs = config.server.shutdown_timeout_secs;
    info!("Waiting up to {} seconds for connections to close", timeout_secs);

    match tokio::time::timeout(Duration::from_secs(timeout_secs), server).await {
        Ok(joined) => joined??,
        Err(_) => warn!("Connections still open after {} seconds, exiting", timeout_secs),
    }

    info!("Server shut down gracefully");
    Ok(())
}
