use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ConsensusError;

/// Canonical 3-way analyst rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Buy,
    Hold,
    Sell,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Buy => "buy",
            Rating::Hold => "hold",
            Rating::Sell => "sell",
        }
    }
}

impl FromStr for Rating {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Rating::Buy),
            "hold" => Ok(Rating::Hold),
            "sell" => Ok(Rating::Sell),
            other => Err(ConsensusError::CorruptRow(format!(
                "unknown normalized rating: {other}"
            ))),
        }
    }
}

/// A persisted analyst consensus report.
///
/// Immutable once written; (stock_code, security_firm, report_date) is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub stock_code: String,
    pub security_firm: String,
    pub rating_raw: String,
    pub rating: Rating,
    pub target_price: Decimal,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Ingestion input for a report, before normalization and id assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    pub stock_code: String,
    pub security_firm: String,
    pub rating_raw: String,
    pub target_price: Decimal,
    pub report_date: NaiveDate,
    /// Narrative text to embed; reports without one get no vector.
    #[serde(default)]
    pub analysis_content: Option<String>,
}

/// Per-rating report counts for one security
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
}

impl RatingDistribution {
    pub fn tally(&mut self, rating: Rating) {
        match rating {
            Rating::Buy => self.buy += 1,
            Rating::Hold => self.hold += 1,
            Rating::Sell => self.sell += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.buy + self.hold + self.sell
    }
}

/// Aggregate consensus view for one security, recomputed per query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub stock_code: String,
    pub total_reports: u32,
    pub rating_distribution: RatingDistribution,
    pub average_target_price: Decimal,
    pub latest_report_date: NaiveDate,
}

/// One ranked similarity-search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub report_id: i64,
    pub stock_code: String,
    pub security_firm: String,
    pub rating: Rating,
    pub target_price: Decimal,
    pub report_date: NaiveDate,
    pub similarity: f64,
}

/// Embedding store statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmbeddingStats {
    pub total_embeddings: u64,
    pub dimension: usize,
}
