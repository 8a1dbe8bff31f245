use crate::auth::{LoginRequest, LoginResponse};
use crate::error::{AppError, AppResult};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use std::sync::Arc;

use super::{AppJson, AppState};

/// Exchange username and password for a JWT
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .store
        .get_user_by_username(&payload.username)
        .await?
        .ok_or_else(invalid)?;

    let password_ok = bcrypt::verify(&payload.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
    if !password_ok {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Unauthorized("User account is inactive".to_string()));
    }

    let token = state.auth_service.generate_token(user.id, &user.username)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        username: user.username,
    }))
}
