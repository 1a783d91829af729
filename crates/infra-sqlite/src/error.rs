// sqlx -> AppError mapping

use ingest_core::domain::Lease;
use ingest_core::error::AppError;

/// Convert sqlx::Error to AppError with SQLite result codes decoded
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    // UNIQUE / PRIMARY KEY constraint failed
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // FOREIGN KEY constraint failed: the referenced document/version is gone
                    "787" | "3850" => AppError::Validation(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // SQLITE_BUSY
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    // SQLITE_FULL
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// A fenced statement matched no row
pub(crate) fn lease_lost(lease: &Lease) -> AppError {
    AppError::LeaseLost(format!(
        "job {} attempt {} is no longer held by {}",
        lease.job_id, lease.attempt, lease.worker_id
    ))
}
