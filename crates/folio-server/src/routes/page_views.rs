use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use folio_core::page_view::PageViewPayload;

use crate::{
    client_ip::extract_client_ip, error::AppError, rate_limit::RateLimitPurpose,
    routes::visitors::header_user_agent, state::AppState,
};

/// `POST /api/page-views` - record one page load.
///
/// Device type, browser and OS come from the `User-Agent` header; country
/// is copied from the visitor row for the calling IP.
///
/// ## Response
/// `201 Created` with `{ "data": <page view> }`.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create_page_view(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PageViewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let client_ip = extract_client_ip(&headers);

    if let Err(retry_after_seconds) = state
        .check_rate_limit(RateLimitPurpose::PageView, &client_ip)
        .await
    {
        return Err(AppError::RateLimited {
            retry_after_seconds,
        });
    }

    let user_agent = header_user_agent(&headers);
    let page_view = state
        .tracker
        .record_page_view(&client_ip, user_agent.as_deref(), payload)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "data": page_view }))))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationPayload {
    pub duration_seconds: f64,
}

/// `PATCH /api/page-views/{id}/duration` - unload beacon.
#[tracing::instrument(skip(state, payload))]
pub async fn update_duration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<DurationPayload>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .tracker
        .set_page_view_duration(&id, payload.duration_seconds)
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("Page view not found: {id}")));
    }
    Ok(Json(json!({
        "data": { "id": id, "duration_seconds": payload.duration_seconds }
    })))
}
