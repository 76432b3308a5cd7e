use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{routes, ApiState};
use crate::error::{DomainError, DomainResult};

pub async fn run(state: ApiState) -> DomainResult<()> {
    let port = state.config.api.port;
    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("refguard API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| DomainError::Other(format!("server error: {e}")))
}
