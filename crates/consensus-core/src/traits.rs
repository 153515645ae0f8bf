use async_trait::async_trait;

use crate::{ConsensusError, EmbeddingStats, Rating, Report, ReportInput};

/// Trait for text-to-vector encoders.
///
/// Implementations must be deterministic for identical input and produce
/// unit-norm vectors of a fixed dimension; the search engine's correctness
/// depends on both. An unavailable encoder is a fatal error for the
/// operation that needed it.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Output dimension shared by every vector this encoder produces
    fn dimension(&self) -> usize;

    async fn encode(&self, text: &str) -> Result<Vec<f32>, ConsensusError>;

    /// Batch form; preserves input order, one output per input.
    async fn encode_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ConsensusError>;
}

/// Trait for report persistence, keyed by (stock_code, security_firm, report_date)
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Insert a report unless its unique triple already exists; either way,
    /// return the id of the row that holds the triple. A concurrent-writer
    /// race on the same triple must resolve to the winner's id, never a
    /// duplicate-key fault.
    async fn insert_if_absent(
        &self,
        input: &ReportInput,
        rating: Rating,
    ) -> Result<i64, ConsensusError>;

    async fn get(&self, id: i64) -> Result<Option<Report>, ConsensusError>;

    async fn load_by_security(&self, stock_code: &str) -> Result<Vec<Report>, ConsensusError>;

    /// Most recently ingested reports, newest first.
    async fn recent(
        &self,
        limit: u32,
        stock_code: Option<&str>,
    ) -> Result<Vec<Report>, ConsensusError>;

    /// Distinct security codes with at least one report.
    async fn list_securities(&self, limit: u32, offset: u32)
        -> Result<Vec<String>, ConsensusError>;
}

/// Trait for embedding persistence, one vector per report id
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    async fn get(&self, report_id: i64) -> Result<Option<Vec<f32>>, ConsensusError>;

    /// Store or overwrite the vector for a report.
    async fn put(&self, report_id: i64, vector: &[f32]) -> Result<(), ConsensusError>;

    /// Enumerate stored vectors joined with their report metadata,
    /// optionally restricted to one security.
    async fn scan(
        &self,
        stock_code: Option<&str>,
    ) -> Result<Vec<(Report, Vec<f32>)>, ConsensusError>;

    async fn stats(&self) -> Result<EmbeddingStats, ConsensusError>;
}
