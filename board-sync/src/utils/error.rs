//! 统一错误处理
//!
//! The core reports every failure as a [`shared::AppError`]; this module maps
//! storage failures onto the shared error codes.
//!
//! | StoreError | ErrorCode |
//! |------------|-----------|
//! | `NotFound` | `NotFound` (0003) |
//! | `InvalidPath` | `InvalidRequest` (0005) |
//! | `Unavailable` | `StoreUnavailable` (9003) |
//! | redb / serde / join | `DatabaseError` (9002) |

use tracing::error;

use crate::store::StoreError;

pub use shared::error::{AppError, AppResult, ErrorCategory, ErrorCode};

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(path) => AppError::not_found(path),
            StoreError::InvalidPath(path) => {
                AppError::invalid(format!("Invalid document path: {}", path))
            }
            StoreError::Unavailable(msg) => AppError::unavailable(msg),
            other => {
                error!(target: "database", error = %other, "Store error occurred");
                AppError::database(other.to_string())
            }
        }
    }
}
