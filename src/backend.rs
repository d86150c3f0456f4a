//! Deployability placeholder backend.
//!
//! A minimal health-check endpoint (`GET /api/hello`) gated by a static
//! shared-secret header, unrelated to the conversation path. Started as a
//! background task when enabled.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
struct BackendState {
    api_key: String,
}

/// Constant-shape check of the shared-secret header.
fn authorized(headers: &HeaderMap, api_key: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == api_key)
        .unwrap_or(false)
}

async fn handle_hello(
    State(state): State<BackendState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, &state.api_key) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Forbidden" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "message": "Hello from the voice agent backend!" })),
    )
}

pub fn router(api_key: String) -> Router {
    Router::new()
        .route("/api/hello", get(handle_hello))
        .with_state(BackendState { api_key })
}

/// Bind and serve in the background; bind failures are logged, not fatal.
pub async fn start_health_server(port: u16, api_key: String) {
    let app = router(api_key);
    let addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind health server on {addr}: {e}");
            return;
        }
    };
    info!("Health server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Health server error: {e}");
        }
    });
}
