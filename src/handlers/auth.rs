use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::require_user;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::services::auth::{self, Registration};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    // bcrypt is CPU-bound
    let user = tokio::task::spawn_blocking(move || form.into_user())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::Validation)?;

    let inserted = {
        let db = state.conn()?;
        queries::insert_user(&db, &user)?
    };
    if !inserted {
        return Err(AppError::Conflict(
            "an account with this email already exists".to_string(),
        ));
    }

    tracing::info!(user_id = %user.id, "user registered");

    let token = auth::issue_token(&state.config.jwt_secret, &user.id, state.config.jwt_ttl_hours)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::InvalidCredentials("invalid email or password".to_string());

    let user = {
        let db = state.conn()?;
        queries::get_user_by_email(&db, &auth::normalize_email(&req.email))?
    }
    .ok_or_else(invalid)?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !verified {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(invalid());
    }

    let token = auth::issue_token(&state.config.jwt_secret, &user.id, state.config.jwt_ttl_hours)?;
    Ok(Json(AuthResponse { token, user }))
}

// POST /api/auth/logout
pub async fn logout() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "logged out" }))
}

// GET /api/users/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    Ok(Json(require_user(&state, &headers)?))
}
