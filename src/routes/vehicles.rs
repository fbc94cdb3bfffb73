use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use url::form_urlencoded;

use crate::{
    contact,
    error::{AppError, AppResult, OptionExt},
    middleware::auth::is_authorized,
    query::page_links,
    state::AppState,
    types::{PageLinks, Pagination, VehicleDetailResponse, VehicleInput, VehicleListResponse},
    validation,
};

const LIST_PATH: &str = "/vehicles";

fn query_params(raw: Option<&str>) -> HashMap<String, String> {
    form_urlencoded::parse(raw.unwrap_or_default().as_bytes()).into_owned().collect()
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> AppResult<impl IntoResponse> {
    let params = query_params(raw.as_deref());
    let include_drafts = params.get("includeDrafts").is_some_and(|v| v == "true")
        && is_authorized(&headers, &state.config.admin.token);
    let filters = validation::parse_filters_or_default(&params);

    let fetched = state.repo.fetch_vehicles(&filters, include_drafts).await;
    state.metrics.inc_vehicle_lists();
    state.metrics.record_read(fetched.is_fallback());
    let fallback = fetched.is_fallback();
    let page = fetched.into_inner();

    let (prev, next) = page_links(raw.as_deref().unwrap_or_default(), LIST_PATH, page.page, page.total_pages);
    Ok(Json(VehicleListResponse {
        items: page.items,
        pagination: Pagination {
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages,
        },
        fallback,
        links: PageLinks { prev, next },
    }))
}

pub async fn get_vehicle(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let fetched = state.repo.fetch_vehicle_by_id(&id).await;
    state.metrics.inc_vehicle_lookups();
    state.metrics.record_read(fetched.is_fallback());
    let fallback = fetched.is_fallback();
    let vehicle = fetched.into_inner().ok_or_not_found("Vehicle")?;

    let mut headers = HeaderMap::new();
    if fallback {
        headers.insert(HeaderName::from_static("x-data-source"), HeaderValue::from_static("fallback"));
    }
    Ok((headers, Json(vehicle)))
}

/// Public detail page data. Drafts are not found.
pub async fn get_vehicle_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let fetched = state.repo.fetch_vehicle_by_slug(&slug).await;
    state.metrics.inc_vehicle_lookups();
    state.metrics.record_read(fetched.is_fallback());
    let fallback = fetched.is_fallback();
    let vehicle = fetched.into_inner().filter(|v| v.published).ok_or_not_found("Vehicle")?;

    let contact_url = contact::vehicle_contact_link(&vehicle);
    Ok(Json(VehicleDetailResponse { vehicle, contact_url, fallback }))
}

/// Checks demo mode before reading the body, then validates it.
fn parse_vehicle_body(state: &AppState, body: &Bytes) -> AppResult<VehicleInput> {
    if !state.repo.store().is_configured() {
        return Err(AppError::DemoMode);
    }
    let json: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    validation::validate_vehicle_input(&json).map_err(AppError::Validation)
}

pub async fn create_vehicle(State(state): State<AppState>, body: Bytes) -> AppResult<impl IntoResponse> {
    let input = parse_vehicle_body(&state, &body)?;
    let vehicle = state.repo.create_vehicle(&input).await?;
    state.metrics.inc_vehicles_created();
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let input = parse_vehicle_body(&state, &body)?;
    let vehicle = state.repo.update_vehicle(&id, &input).await?;
    state.metrics.inc_vehicles_updated();
    Ok(Json(vehicle))
}
