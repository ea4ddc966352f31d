pub mod auth;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod routes;
pub mod schedules;

use axum::http::{header, HeaderMap};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::services;
use crate::state::AppState;

/// Resolves `Authorization: Bearer <jwt>` to a registered user.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    user_for_token(state, token.trim())
}

pub fn user_for_token(state: &AppState, token: &str) -> Result<User, AppError> {
    let user_id = services::auth::verify_token(&state.config.jwt_secret, token)
        .ok_or(AppError::Unauthorized)?;

    let conn = state.conn()?;
    queries::get_user(&conn, &user_id)?.ok_or(AppError::Unauthorized)
}
