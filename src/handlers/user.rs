// src/handlers/user.rs
use crate::handlers::{service_error, HandlerError};
use crate::models::user::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{post, Router},
};
use std::sync::Arc;

pub fn user_routes() -> Router {
    Router::new()
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
}

async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, HandlerError> {
    let user_id = state
        .user_service
        .register(&payload.login, &payload.password)
        .await
        .map_err(service_error)?;

    Ok(Json(RegisterResponse { user_id }))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HandlerError> {
    let outcome = state
        .user_service
        .login(&payload.login, &payload.password)
        .await
        .map_err(service_error)?;

    Ok(Json(LoginResponse {
        user_id: outcome.user_id,
        is_admin: outcome.is_admin,
        is_super_admin: outcome.is_super_admin,
    }))
}
