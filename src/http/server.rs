//! HTTP Server
//!
//! Router construction and the serve loop.

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::engine::Engine;
use crate::error::Result;

use super::handlers::{delete_key, get_key, health, put_key};

/// Engine handle shared by every handler
pub type SharedEngine = Arc<Engine>;

/// Build the router over an opened engine
pub fn build_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/v1/:key", get(get_key).put(put_key).delete(delete_key))
        .route("/healthz", get(health))
        .with_state(engine)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(listener: TcpListener, engine: SharedEngine, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
