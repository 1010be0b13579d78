use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::{
    client_ip::extract_client_ip, error::AppError, rate_limit::RateLimitPurpose,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct TrackPayload {
    pub user_agent: Option<String>,
}

/// `POST /api/visitors/track` - count a visit from the calling IP.
///
/// The body is optional. A `user_agent` in the body wins over the
/// `User-Agent` header.
///
/// ## Response
/// `200 OK` with `{ "data": { country, region, city, total_visitors,
/// this_visitor_count, is_new } }`.
#[tracing::instrument(skip(state, headers, body))]
pub async fn track_visitor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let client_ip = extract_client_ip(&headers);

    if let Err(retry_after_seconds) = state
        .check_rate_limit(RateLimitPurpose::VisitorTracking, &client_ip)
        .await
    {
        return Err(AppError::RateLimited {
            retry_after_seconds,
        });
    }

    let payload: TrackPayload = if body.iter().all(u8::is_ascii_whitespace) {
        TrackPayload::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let user_agent = payload.user_agent.or_else(|| header_user_agent(&headers));
    let summary = state
        .tracker
        .record_visit(&client_ip, user_agent.as_deref())
        .await?;

    Ok(Json(json!({ "data": summary })))
}

pub(crate) fn header_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
