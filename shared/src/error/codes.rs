//! Unified error codes for the ordering board
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 6xxx: Recipe errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so they serialize compactly
/// and can be matched on by non-Rust clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Cart is empty, nothing to order
    OrderEmpty = 4007,
    /// Order number allocation gave up after the retry budget
    SequenceExhausted = 4010,

    // ==================== 6xxx: Recipe ====================
    /// Recipe not found
    RecipeNotFound = 6001,
    /// Recipe name is empty
    RecipeNameEmpty = 6002,
    /// Category label is not one of the fixed categories
    UnknownCategory = 6003,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Backing store is unreachable
    StoreUnavailable = 9003,
}

impl ErrorCode {
    /// Get the numeric value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::SequenceExhausted => "Order number allocation exhausted its retries",

            ErrorCode::RecipeNotFound => "Recipe not found",
            ErrorCode::RecipeNameEmpty => "Recipe name must not be empty",
            ErrorCode::UnknownCategory => "Unknown category",

            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::StoreUnavailable => "Store is unavailable",
        }
    }

    /// Whether retrying the same operation later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::SequenceExhausted | ErrorCode::StoreUnavailable | ErrorCode::DatabaseError
        )
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 to [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),

            4001 => Ok(ErrorCode::OrderNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4010 => Ok(ErrorCode::SequenceExhausted),

            6001 => Ok(ErrorCode::RecipeNotFound),
            6002 => Ok(ErrorCode::RecipeNameEmpty),
            6003 => Ok(ErrorCode::UnknownCategory),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::StoreUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::OrderEmpty.code(), 4007);
        assert_eq!(ErrorCode::RecipeNameEmpty.code(), 6002);
        assert_eq!(ErrorCode::DatabaseError.code(), 9002);
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(7777), Err(InvalidErrorCode(7777)));
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
        assert_eq!(ErrorCode::try_from(4010), Ok(ErrorCode::SequenceExhausted));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::UnknownCategory).unwrap();
        assert_eq!(json, "6003");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::UnknownCategory);
    }

    #[test]
    fn test_transient() {
        assert!(ErrorCode::SequenceExhausted.is_transient());
        assert!(!ErrorCode::ValidationFailed.is_transient());
    }
}
