// src/handlers/tz.rs
use crate::handlers::{bad_request, tz_error, HandlerError};
use crate::tz::{TzAnalysis, MAX_UPLOAD_BYTES};
use crate::AppState;
use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Extension},
    response::Json,
    routing::{post, Router},
};
use std::sync::Arc;

pub fn tz_routes() -> Router {
    Router::new()
        .route("/api/tz/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn analyze(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TzAnalysis>, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("document.docx").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?
            .to_vec();

        tracing::info!(file_name = %file_name, bytes = data.len(), "document upload received");

        let analysis = state
            .tz_service
            .analyze_document(&file_name, data)
            .await
            .map_err(tz_error)?;

        return Ok(Json(analysis));
    }

    Err(bad_request("multipart field 'file' is required".to_string()))
}
