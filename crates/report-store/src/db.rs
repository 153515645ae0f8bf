use consensus_core::ConsensusError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub(crate) fn store_err(e: sqlx::Error) -> ConsensusError {
    ConsensusError::Store(e.to_string())
}

#[derive(Clone)]
pub struct ConsensusDb {
    pool: SqlitePool,
}

impl ConsensusDb {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self, ConsensusError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(store_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// In-memory database for tests.
    ///
    /// Capped at one connection: every pooled connection to `:memory:`
    /// opens its own database, so a larger pool would lose the schema.
    pub async fn in_memory() -> Result<Self, ConsensusError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(store_err)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<(), ConsensusError> {
        let schema = include_str!("../schema.sql");

        // Execute schema (split by statement since sqlx doesn't support multiple statements)
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&self.pool)
                    .await
                    .map_err(store_err)?;
            }
        }

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database connectivity
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Check if database file exists
    pub fn exists(path: &str) -> bool {
        let file_path = path.strip_prefix("sqlite:").unwrap_or(path);
        Path::new(file_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_db_creation() {
        let db = ConsensusDb::in_memory().await.unwrap();
        assert!(db.pool().acquire().await.is_ok());
        assert!(db.health_check().await);
    }
}
