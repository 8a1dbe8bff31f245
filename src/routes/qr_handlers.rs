use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{CreateQrRequest, MessageResponse};
use crate::services::qr::{QrImage, QrService};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use std::sync::Arc;

use super::{AppJson, AppState};

pub async fn create_qr(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateQrRequest>,
) -> AppResult<impl IntoResponse> {
    let qr = QrService::new(state.store.as_ref())
        .create(user.id, payload.text.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(qr)))
}

/// The caller's QR codes, newest first
pub async fn list_qr(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let codes = QrService::new(state.store.as_ref()).list(user.id).await?;
    Ok(Json(codes))
}

pub async fn delete_qr(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    QrService::new(state.store.as_ref()).delete(user.id, id).await?;
    Ok(Json(MessageResponse::new("QR code removed")))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", e))
}

/// Upload a rendered QR image (`qrImage`, `text`, optional `token` fields)
pub async fn upload_qr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut text = None;
    let mut token = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "qrImage" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some(QrImage {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            "text" => text = Some(field.text().await.map_err(multipart_error)?),
            "token" => token = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let user = state.auth_service.authenticate(&headers, token.as_deref())?;
    let image = image.ok_or_else(|| AppError::Validation("QR image is required.".to_string()))?;

    let qr = QrService::new(state.store.as_ref())
        .upload(user.id, text.as_deref(), image, state.image_host.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(qr)))
}
