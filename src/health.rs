use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

/// Field order is part of the contract: `{"status":"ok","service":...}`.
#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    service: String,
}

async fn health(State(service): State<Arc<str>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        service: service.to_string(),
    })
}

/// Liveness router. Shares no state with the conversation handler.
pub fn router(service_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(Arc::<str>::from(service_name))
}

/// Bind the liveness listener and serve it on its own task.
pub async fn spawn(bind: SocketAddr, service_name: &str) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind health endpoint to {bind}"))?;
    let addr = listener.local_addr()?;
    let app = router(service_name);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Health endpoint stopped: {}", e);
        }
    });

    info!("Health endpoint listening on http://{addr}/health");
    Ok(addr)
}
