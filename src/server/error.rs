//! Ошибки HTTP-слоя

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::PipelineError;
use crate::types::ErrorResponse;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Ошибка клиента до начала обработки (нет файла, не CSV)
    #[error("{0}")]
    BadRequest(String),

    #[error("Model is not loaded: {0}")]
    ModelNotLoaded(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // Ошибки обработки отдаются со статусом 200 и `status: "error"` в теле
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::ModelNotLoaded(_) | ServerError::Pipeline(_) => StatusCode::OK,
        };

        match &self {
            ServerError::BadRequest(msg) => tracing::warn!(detail = %msg, "Rejected request"),
            other => tracing::error!(detail = %other, "Request failed"),
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
