//! Report ingestion: normalize, persist, embed.

use std::sync::Arc;

use consensus_core::{
    normalize_rating, ConsensusError, EmbeddingRepository, ReportInput, ReportRepository,
    TextEncoder,
};
use serde::{Deserialize, Serialize};

/// Outcome of a batch ingestion run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

pub struct IngestService {
    reports: Arc<dyn ReportRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    encoder: Arc<dyn TextEncoder>,
}

impl IngestService {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        encoder: Arc<dyn TextEncoder>,
    ) -> Self {
        Self {
            reports,
            embeddings,
            encoder,
        }
    }

    /// Ingest one report: normalize the raw rating, insert the row
    /// (idempotent on the unique triple), then derive and store the
    /// embedding for its narrative text.
    ///
    /// Embedding is best-effort: an encoder or store failure there leaves
    /// the already-persisted report in place and is only logged. Re-running
    /// ingestion for the same report re-derives and overwrites the vector.
    pub async fn ingest(&self, input: &ReportInput) -> Result<i64, ConsensusError> {
        let rating = normalize_rating(&input.rating_raw);
        let report_id = self.reports.insert_if_absent(input, rating).await?;

        if let Some(content) = &input.analysis_content {
            if let Err(e) = self.embed_report(report_id, content).await {
                tracing::warn!(report_id, error = %e, "embedding failed, report kept without vector");
            }
        }

        Ok(report_id)
    }

    async fn embed_report(&self, report_id: i64, text: &str) -> Result<(), ConsensusError> {
        let vector = self.encoder.encode(text).await?;
        self.embeddings.put(report_id, &vector).await
    }

    /// Ingest a batch, counting per-report outcomes instead of aborting on
    /// the first failure.
    pub async fn ingest_batch(&self, inputs: &[ReportInput]) -> IngestOutcome {
        let mut outcome = IngestOutcome {
            total: inputs.len(),
            ..Default::default()
        };

        for input in inputs {
            match self.ingest(input).await {
                Ok(report_id) => {
                    tracing::info!(
                        report_id,
                        stock_code = %input.stock_code,
                        firm = %input.security_firm,
                        "report ingested"
                    );
                    outcome.processed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        stock_code = %input.stock_code,
                        firm = %input.security_firm,
                        error = %e,
                        "report ingestion failed"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}
