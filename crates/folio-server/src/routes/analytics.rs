use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use folio_core::analytics::AnalyticsRange;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// `GET /api/analytics` - dashboard snapshot.
///
/// `?range=1d|7d|30d|90d` (default `7d`) or `?start_date=&end_date=`
/// (`YYYY-MM-DD`, inclusive).
#[tracing::instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let range = AnalyticsRange::parse(
        query.range.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let snapshot = state.tracker.analytics_snapshot(range).await?;
    Ok(Json(json!({ "data": snapshot })))
}
