use async_trait::async_trait;
use consensus_core::{
    decode_vector, encode_vector, ConsensusError, EmbeddingRepository, EmbeddingStats, Report,
};
use sqlx::FromRow;

use crate::db::{store_err, ConsensusDb};
use crate::reports::ReportRow;

/// SQLite-backed embedding store.
///
/// Blobs are written in the dimension-tagged little-endian format from
/// `consensus_core::vector`; the configured dimension is enforced on both
/// the write and the read path.
#[derive(Clone)]
pub struct EmbeddingStore {
    db: ConsensusDb,
    dimension: usize,
}

#[derive(Debug, FromRow)]
struct EmbeddingJoinRow {
    embedding: Vec<u8>,
    #[sqlx(flatten)]
    report: ReportRow,
}

impl EmbeddingStore {
    pub fn new(db: ConsensusDb, dimension: usize) -> Self {
        Self { db, dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn decode_row(&self, row: EmbeddingJoinRow) -> Result<(Report, Vec<f32>), ConsensusError> {
        let vector = decode_vector(&row.embedding, self.dimension)?;
        let report = Report::try_from(row.report)?;
        Ok((report, vector))
    }
}

#[async_trait]
impl EmbeddingRepository for EmbeddingStore {
    async fn get(&self, report_id: i64) -> Result<Option<Vec<f32>>, ConsensusError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT embedding FROM vector_embeddings WHERE report_id = ?")
                .bind(report_id)
                .fetch_optional(self.db.pool())
                .await
                .map_err(store_err)?;

        row.map(|(blob,)| decode_vector(&blob, self.dimension))
            .transpose()
    }

    async fn put(&self, report_id: i64, vector: &[f32]) -> Result<(), ConsensusError> {
        if vector.len() != self.dimension {
            return Err(ConsensusError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        sqlx::query(
            "INSERT INTO vector_embeddings (report_id, embedding) VALUES (?, ?) \
             ON CONFLICT(report_id) DO UPDATE SET embedding = excluded.embedding",
        )
        .bind(report_id)
        .bind(encode_vector(vector))
        .execute(self.db.pool())
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn scan(
        &self,
        stock_code: Option<&str>,
    ) -> Result<Vec<(Report, Vec<f32>)>, ConsensusError> {
        let rows: Vec<EmbeddingJoinRow> = match stock_code {
            Some(code) => {
                sqlx::query_as(
                    "SELECT e.embedding, r.id, r.stock_code, r.security_firm, r.rating_raw, \
                            r.rating_norm, r.target_price, r.report_date, r.created_at \
                     FROM vector_embeddings e \
                     JOIN consensus_reports r ON e.report_id = r.id \
                     WHERE r.stock_code = ?",
                )
                .bind(code)
                .fetch_all(self.db.pool())
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT e.embedding, r.id, r.stock_code, r.security_firm, r.rating_raw, \
                            r.rating_norm, r.target_price, r.report_date, r.created_at \
                     FROM vector_embeddings e \
                     JOIN consensus_reports r ON e.report_id = r.id",
                )
                .fetch_all(self.db.pool())
                .await
            }
        }
        .map_err(store_err)?;

        rows.into_iter().map(|row| self.decode_row(row)).collect()
    }

    async fn stats(&self) -> Result<EmbeddingStats, ConsensusError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vector_embeddings")
            .fetch_one(self.db.pool())
            .await
            .map_err(store_err)?;

        Ok(EmbeddingStats {
            total_embeddings: count as u64,
            dimension: self.dimension,
        })
    }
}
