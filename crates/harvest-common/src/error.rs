//! Error types shared across the harvest workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Low-level error type for shared helpers
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid change-feed position: {0:?}")]
    InvalidPosition(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}
