// src/handlers/mod.rs
pub mod chat;
pub mod tz;
pub mod user;

use axum::http::StatusCode;
use axum::response::Json;

use crate::models::ErrorResponse;
use crate::services::ServiceError;
use crate::tz::TzError;

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(message: String) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            message,
        }),
    )
}

// Only validation, duplicate-login and credential failures carry their own
// status; everything else leaves as an opaque 500 so internals never leak.
pub(crate) fn service_error(err: ServiceError) -> HandlerError {
    let (status, message) = match err {
        ServiceError::InvalidArgument(reason) => (StatusCode::BAD_REQUEST, reason),
        ServiceError::AlreadyExists => (StatusCode::CONFLICT, "login already taken".to_string()),
        ServiceError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "invalid login or password".to_string(),
        ),
        other => {
            tracing::error!("request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };

    (
        status,
        Json(ErrorResponse {
            success: false,
            message,
        }),
    )
}

pub(crate) fn tz_error(err: TzError) -> HandlerError {
    match err {
        TzError::EmptyFile | TzError::FileTooLarge => bad_request(err.to_string()),
        other => {
            tracing::error!("document analysis failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "internal error".to_string(),
                }),
            )
        }
    }
}
