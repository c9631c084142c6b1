//! 工具模块 - 错误映射与日志

pub mod error;
pub mod logger;

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
