// src/models/mod.rs
pub mod chat;
pub mod user;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}
