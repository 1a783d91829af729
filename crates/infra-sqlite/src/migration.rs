// Migration Runner

use crate::error::map_sqlx_error;
use ingest_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

/// (version, description, sql), applied in order
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "Document metadata",
        include_str!("../migrations/001_documents.sql"),
    ),
    (
        2,
        "Ingestion jobs",
        include_str!("../migrations/002_ingestion_jobs.sql"),
    ),
];

/// Run database migrations. Safe to call on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    let current_version: i64 = if table_exists > 0 {
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(map_sqlx_error)?
    } else {
        0
    };

    info!(current_version, "Checking database schema");

    for (version, description, sql) in MIGRATIONS {
        if current_version < *version {
            info!(version, description, "Applying migration");
            apply_migration(pool, *version, sql).await?;
        }
    }

    Ok(())
}

/// Apply a single migration SQL file and record it, in one transaction
async fn apply_migration(pool: &SqlitePool, version: i64, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    // Split by semicolon and execute each statement
    for statement in sql.split(';') {
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
    }

    sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(version)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingestion_jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, 2);
    }
}
