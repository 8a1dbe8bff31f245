use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::services::analytics::AnalyticsService;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use std::sync::Arc;

use super::types::EventsQuery;
use super::AppState;

/// Clicks per device bucket across all of the caller's links
pub async fn device_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let data = AnalyticsService::new(state.store.as_ref())
        .device(user.id)
        .await?;
    Ok(Json(data))
}

/// Daily click series plus the busiest day
pub async fn over_time_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let data = AnalyticsService::new(state.store.as_ref())
        .over_time(user.id)
        .await?;
    Ok(Json(data))
}

pub async fn summary_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let data = AnalyticsService::new(state.store.as_ref())
        .summary(user.id)
        .await?;
    Ok(Json(data))
}

pub async fn link_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(short_code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let data = AnalyticsService::new(state.store.as_ref())
        .for_link(user.id, &short_code)
        .await?;
    Ok(Json(data))
}

/// Raw analytics events, newest first
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<EventsQuery>,
) -> AppResult<impl IntoResponse> {
    let events = AnalyticsService::new(state.store.as_ref())
        .events(user.id, query.slug, query.limit)
        .await?;
    Ok(Json(events))
}
