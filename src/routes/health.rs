use crate::{state::AppState, store::StoreError};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Liveness only; never touches the database
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: the catalog is ready only with a reachable database
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let ping = state.repo.store().ping();
    match tokio::time::timeout(std::time::Duration::from_secs(5), ping).await {
        Ok(Ok(())) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(StoreError::NotConfigured)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "not ready: database not configured").into_response()
        }
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.get_snapshot().to_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Build info plus which optional backends are configured
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "site": state.config.site.name,
        "flags": state.config.flags(),
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
