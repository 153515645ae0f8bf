//! Similarity search over stored report embeddings.
//!
//! Deliberately a linear scan: every stored vector is scored against the
//! query on each call. That holds to the low tens of thousands of reports;
//! an ANN index could be swapped in behind `search` without changing the
//! observable contract.

use std::cmp::Ordering;
use std::sync::Arc;

use consensus_core::{
    cosine_similarity, ConsensusError, EmbeddingRepository, SearchMatch, TextEncoder,
};

/// Default threshold for targeted search
pub const TARGETED_THRESHOLD: f64 = 0.5;
/// Looser threshold for broad exploratory search
pub const BROAD_THRESHOLD: f64 = 0.3;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Result cap, clamped to [1, MAX_LIMIT]
    pub limit: usize,
    /// Minimum similarity for a candidate to be returned
    pub threshold: f64,
    /// Restrict candidates to one security
    pub stock_code: Option<String>,
}

impl SearchRequest {
    pub fn targeted(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_LIMIT,
            threshold: TARGETED_THRESHOLD,
            stock_code: None,
        }
    }

    pub fn broad(query: impl Into<String>) -> Self {
        Self {
            threshold: BROAD_THRESHOLD,
            ..Self::targeted(query)
        }
    }

    pub fn for_security(mut self, stock_code: impl Into<String>) -> Self {
        self.stock_code = Some(stock_code.into());
        self
    }
}

pub struct SearchEngine {
    encoder: Arc<dyn TextEncoder>,
    embeddings: Arc<dyn EmbeddingRepository>,
}

impl SearchEngine {
    pub fn new(encoder: Arc<dyn TextEncoder>, embeddings: Arc<dyn EmbeddingRepository>) -> Self {
        Self { encoder, embeddings }
    }

    /// Rank stored reports by similarity to a free-text query.
    ///
    /// The query is encoded once, candidates are scanned (optionally
    /// filtered by security), scored by cosine similarity, filtered by
    /// threshold, sorted similarity-descending with report-id-ascending
    /// tie-break, and truncated to the limit. An empty result is a normal
    /// outcome, not an error.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchMatch>, ConsensusError> {
        let limit = request.limit.clamp(1, MAX_LIMIT);

        let query_vector = self.encoder.encode(&request.query).await?;
        let candidates = self.embeddings.scan(request.stock_code.as_deref()).await?;
        let scanned = candidates.len();

        let mut matches = Vec::new();
        for (report, vector) in candidates {
            let similarity = cosine_similarity(&query_vector, &vector)?;
            if similarity < request.threshold {
                continue;
            }
            matches.push(SearchMatch {
                report_id: report.id,
                stock_code: report.stock_code,
                security_firm: report.security_firm,
                rating: report.rating,
                target_price: report.target_price,
                report_date: report.report_date,
                similarity,
            });
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.report_id.cmp(&b.report_id))
        });
        matches.truncate(limit);

        tracing::debug!(
            scanned,
            returned = matches.len(),
            threshold = request.threshold,
            "similarity search complete"
        );

        Ok(matches)
    }
}
