use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ItemId;

/// Errors raised by the recommendation engine itself
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Item {0} is not in the catalog")]
    NotFound(ItemId),

    #[error("Cold start: {0}")]
    ColdStart(String),

    #[error("Cannot train on an empty rating set")]
    EmptyDataset,

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Invalid training parameters: {0}")]
    InvalidParams(String),

    #[error("Training diverged after {epochs} epochs")]
    TrainingDiverged { epochs: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Engine(EngineError::ColdStart(_)) => StatusCode::NOT_FOUND,
            AppError::Engine(EngineError::InvalidParams(_)) => StatusCode::BAD_REQUEST,
            AppError::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
