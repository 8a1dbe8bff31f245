use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::middleware::RequestContext;
use crate::models::{CreateLinkRequest, MessageResponse, UpdateLinkRequest};
use crate::services::links::LinkService;
use crate::services::redirect::{Redirector, Visit};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use std::sync::Arc;

use super::{AppJson, AppState};

/// Create a short link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateLinkRequest>,
) -> AppResult<impl IntoResponse> {
    let link = LinkService::new(&state).create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let links = LinkService::new(&state).list(user.id).await?;
    Ok(Json(links))
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateLinkRequest>,
) -> AppResult<impl IntoResponse> {
    let link = LinkService::new(&state).update(user.id, id, payload).await?;
    Ok(Json(link))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    LinkService::new(&state).delete(user.id, id).await?;
    Ok(Json(MessageResponse::new("Link removed")))
}

/// Resolve a short code and redirect (302) to its destination
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(short_code): Path<String>,
    context: RequestContext,
) -> AppResult<Response> {
    let visit = Visit {
        timestamp: Utc::now(),
        ip: context.client_ip,
        user_agent: context.user_agent,
        referrer: context.referrer,
    };

    let target = Redirector::new(state.store.as_ref(), &state.job_sender)
        .resolve(&short_code, visit)
        .await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
}
