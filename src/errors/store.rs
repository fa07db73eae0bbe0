use thiserror::Error;
use redis::RedisError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate value for unique field {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
