//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use ingest_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const STORAGE_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_)
        | AppError::Domain(_)
        | AppError::Serialization(_)
        | AppError::UnsupportedParser(_)
        | AppError::EmptyContent => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) | AppError::LeaseLost(_) => code::CONFLICT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Storage(_) | AppError::Io(_) => code::STORAGE_ERROR,
        AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };

    // Plain messages for the variants that already carry one
    let message = match err {
        AppError::Validation(msg)
        | AppError::NotFound(msg)
        | AppError::Conflict(msg)
        | AppError::Database(msg)
        | AppError::Internal(msg) => msg,
        other => other.to_string(),
    };

    ErrorObjectOwned::owned(code, message, None::<()>)
}

pub fn invalid_params(message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code::VALIDATION_ERROR, message.into(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::port::ObjectStoreError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            to_rpc_error(AppError::Validation("bad".into())).code(),
            code::VALIDATION_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::NotFound("job".into())).code(),
            code::NOT_FOUND
        );
        assert_eq!(
            to_rpc_error(AppError::Conflict("dup".into())).code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Database("locked".into())).code(),
            code::DB_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::Storage(ObjectStoreError::NotFound("k".into()))).code(),
            code::STORAGE_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::Internal("boom".into())).code(),
            code::INTERNAL_ERROR
        );
    }

    #[test]
    fn test_message_is_not_double_prefixed() {
        let err = to_rpc_error(AppError::NotFound("ingestion job j1".into()));
        assert_eq!(err.message(), "ingestion job j1");
    }
}
