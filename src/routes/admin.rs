use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;

use crate::{middleware::auth::is_authorized, state::AppState, types::SellersResponse};

/// Active sellers for the admin form. Unauthenticated callers get an empty
/// list rather than an error.
pub async fn list_sellers(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !is_authorized(&headers, &state.config.admin.token) {
        return Json(SellersResponse { sellers: Vec::new(), fallback: None });
    }
    let fetched = state.repo.fetch_active_sellers().await;
    state.metrics.record_read(fetched.is_fallback());
    let fallback = fetched.is_fallback();
    Json(SellersResponse { sellers: fetched.into_inner(), fallback: Some(fallback) })
}

/// Token check for the admin UI; the auth layer has already run.
pub async fn session() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}
