//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;

use casework_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const EXECUTION_ERROR: i32 = 5002;
}

/// Convert AppError to a JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => owned(code::VALIDATION_ERROR, msg),
        // An unregistered kind is a caller-visible configuration mistake
        AppError::Config(msg) => owned(code::VALIDATION_ERROR, msg),
        AppError::NotFound(msg) => owned(code::NOT_FOUND, msg),
        AppError::Conflict(msg) => owned(code::CONFLICT, msg),
        AppError::InvalidState(msg) => owned(code::CONFLICT, msg),
        AppError::Domain(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::Serialization(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::Execution(e) => owned(code::EXECUTION_ERROR, e.to_string()),
        AppError::Io(e) => owned(code::EXECUTION_ERROR, e.to_string()),
        AppError::Internal(msg) => owned(code::INTERNAL_ERROR, msg),
    }
}

/// Rate-limit rejection
pub fn throttled() -> ErrorObjectOwned {
    owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.".to_string(),
    )
}

fn owned(code: i32, message: String) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, message, None::<()>)
}
