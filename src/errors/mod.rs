// Error taxonomy for the HTTP surface, built with thiserror.
use thiserror::Error;
use serde_json::Value;

pub mod response;
pub mod store;

pub use store::{StoreError, StoreResult};

use crate::query::InvalidParam;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    InvalidQuery(#[from] InvalidParam),

    #[error("{0}")]
    Validation(String),

    // `details` carries the missing id(s) back to the client
    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound { message: message.into(), details: Value::Object(Default::default()) }
    }
}

// Duplicate keys only arise from the users' email index
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => AppError::DuplicateEmail,
            other => AppError::Store(other),
        }
    }
}

// Custom result type
pub type AppResult<T> = Result<T, AppError>;
