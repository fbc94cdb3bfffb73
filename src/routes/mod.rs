//! HTTP route handlers for the dealership API.
//!
//! - `vehicles`: public catalog reads and admin create/update
//! - `admin`: seller list and session check for the admin UI
//! - `uploads`: image uploads to object storage
//! - `feed`: sitemap and robots feeds
//! - `health`: liveness, readiness, metrics and version

pub mod admin;
pub mod feed;
pub mod health;
pub mod uploads;
pub mod vehicles;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{middleware, state::AppState};

/// Headroom above the upload limit for multipart framing and the prefix field.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// The full application router, without CORS (added by the binary in debug builds).
pub fn router(state: AppState) -> Router {
    // Token-gated endpoints
    let admin = Router::new()
        .route("/vehicles", post(vehicles::create_vehicle))
        .route("/vehicles/{id}", patch(vehicles::update_vehicle))
        .route("/admin/session", get(admin::session))
        .route(
            "/uploads",
            post(uploads::upload_image)
                .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::auth::require_admin));

    let public = Router::new()
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles/{id}", get(vehicles::get_vehicle))
        .route("/vehicles/slug/{slug}", get(vehicles::get_vehicle_by_slug))
        .route("/admin/sellers", get(admin::list_sellers))
        .route("/sitemap.xml", get(feed::sitemap))
        .route("/robots.txt", get(feed::robots))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version));

    let cfg = state.config.clone();
    public
        .merge(admin)
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}
