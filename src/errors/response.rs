use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use crate::errors::AppError;
use crate::handlers::envelope;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidQuery(_) | AppError::Validation(_) | AppError::DuplicateEmail => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// The IntoResponse trait implementation converts AppError into the { message, data } envelope.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let data = match &self {
            AppError::NotFound { details, .. } => details.clone(),
            AppError::Store(e) => {
                tracing::error!("Store failure: {}", e);
                Value::String(e.to_string())
            }
            _ => json!({}),
        };
        envelope(status, self.to_string(), data)
    }
}

// Malformed request bodies get the same envelope as every other 400
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}
