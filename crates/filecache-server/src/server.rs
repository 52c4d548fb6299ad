//! HTTP server wiring
//!
//! Provides /health, /control (WebSocket) and PUT/GET/DELETE /{token}.

use crate::routes::{control, health, transfer};
use crate::state::SharedState;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/control", get(control::upgrade))
        .route(
            "/{token}",
            get(transfer::download)
                .put(transfer::upload)
                .delete(transfer::delete),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}
