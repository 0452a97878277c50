use crate::domain::error::{AppError, Result};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &str = include_str!("../../../resources/schema.sql");

/// Opens (creating if needed) the store at `db_path`, in WAL mode with foreign keys on,
/// and applies the schema.
pub async fn init_db(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = db_path_to_url(db_path)?;
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse database URL: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {e}")))?;

    apply_schema(&pool).await?;
    ping(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory store; the database lives as long as the pool does.
pub async fn init_in_memory_db() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse database URL: {e}")))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to open in-memory database: {e}")))?;

    apply_schema(&pool).await?;
    Ok(pool)
}

pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {e}")))?;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub test_cases: i64,
    pub test_steps: i64,
    pub test_runs: i64,
    pub token_usage: i64,
}

pub async fn stats(pool: &SqlitePool) -> Result<DatabaseStats> {
    Ok(DatabaseStats {
        test_cases: count_rows(pool, "test_cases").await?,
        test_steps: count_rows(pool, "test_steps").await?,
        test_runs: count_rows(pool, "test_runs").await?,
        token_usage: count_rows(pool, "token_usage").await?,
    })
}

async fn count_rows(pool: &SqlitePool, table: &'static str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count {table}: {e}")))
}

fn db_path_to_url(db_path: &Path) -> Result<String> {
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| AppError::DatabaseError("Database path is not valid UTF-8".to_string()))?;
    Ok(format!("sqlite://{}", db_path_str.replace('\\', "/")))
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA.split(';') {
        let stmt = statement.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to apply schema statement: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema_is_empty() {
        let pool = init_in_memory_db().await.unwrap();
        ping(&pool).await.unwrap();
        assert_eq!(stats(&pool).await.unwrap(), DatabaseStats::default());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_in_memory_db().await.unwrap();
        apply_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_steps_require_existing_case() {
        let pool = init_in_memory_db().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO test_steps (id, case_id, step_index, action) VALUES ('x-1', 'x', 1, 'a')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_db_path_to_url_normalizes_separators() {
        let url = db_path_to_url(Path::new("data\\casebridge.db")).unwrap();
        assert_eq!(url, "sqlite://data/casebridge.db");
    }
}
