//! Per-security consensus aggregation over persisted reports.

use std::sync::Arc;

use consensus_core::{
    ConsensusError, ConsensusSummary, RatingDistribution, ReportRepository,
};
use rust_decimal::Decimal;

pub struct ConsensusAggregator {
    reports: Arc<dyn ReportRepository>,
}

impl ConsensusAggregator {
    pub fn new(reports: Arc<dyn ReportRepository>) -> Self {
        Self { reports }
    }

    /// Compute the consensus view for one security.
    ///
    /// Rating distribution, mean target price and latest report date are
    /// accumulated in a single pass over all reports for the security.
    /// The mean is unweighted: every report counts equally regardless of
    /// firm or recency. An empty report set is `NotFound`, distinguishable
    /// from a real zero-count aggregate; a malformed stored row has
    /// already failed the load, so a returned summary never reflects a
    /// partially-skipped set.
    pub async fn summarize(&self, stock_code: &str) -> Result<ConsensusSummary, ConsensusError> {
        let reports = self.reports.load_by_security(stock_code).await?;

        if reports.is_empty() {
            return Err(ConsensusError::NotFound(stock_code.to_string()));
        }

        let mut distribution = RatingDistribution::default();
        let mut price_sum = Decimal::ZERO;
        let mut latest_report_date = reports[0].report_date;

        for report in &reports {
            distribution.tally(report.rating);
            price_sum += report.target_price;
            if report.report_date > latest_report_date {
                latest_report_date = report.report_date;
            }
        }

        let total_reports = reports.len() as u32;
        let average_target_price = (price_sum / Decimal::from(total_reports)).round_dp(2);

        tracing::debug!(stock_code, total_reports, "consensus summary computed");

        Ok(ConsensusSummary {
            stock_code: stock_code.to_string(),
            total_reports,
            rating_distribution: distribution,
            average_target_price,
            latest_report_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use consensus_core::{normalize_rating, Rating, Report, ReportInput};
    use rust_decimal_macros::dec;

    struct InMemoryReports {
        rows: Vec<Report>,
    }

    #[async_trait]
    impl ReportRepository for InMemoryReports {
        async fn insert_if_absent(
            &self,
            _input: &ReportInput,
            _rating: Rating,
        ) -> Result<i64, ConsensusError> {
            unimplemented!("read-only fake")
        }

        async fn get(&self, id: i64) -> Result<Option<Report>, ConsensusError> {
            Ok(self.rows.iter().find(|r| r.id == id).cloned())
        }

        async fn load_by_security(&self, stock_code: &str) -> Result<Vec<Report>, ConsensusError> {
            Ok(self
                .rows
                .iter()
                .filter(|r| r.stock_code == stock_code)
                .cloned()
                .collect())
        }

        async fn recent(
            &self,
            limit: u32,
            _stock_code: Option<&str>,
        ) -> Result<Vec<Report>, ConsensusError> {
            Ok(self.rows.iter().rev().take(limit as usize).cloned().collect())
        }

        async fn list_securities(
            &self,
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<String>, ConsensusError> {
            unimplemented!("unused by the aggregator")
        }
    }

    fn report(id: i64, stock_code: &str, rating_raw: &str, price: Decimal, date: &str) -> Report {
        Report {
            id,
            stock_code: stock_code.to_string(),
            security_firm: format!("증권사-{id}"),
            rating_raw: rating_raw.to_string(),
            rating: normalize_rating(rating_raw),
            target_price: price,
            report_date: date.parse::<NaiveDate>().unwrap(),
            created_at: chrono::DateTime::UNIX_EPOCH,
        }
    }

    fn aggregator(rows: Vec<Report>) -> ConsensusAggregator {
        ConsensusAggregator::new(Arc::new(InMemoryReports { rows }))
    }

    #[tokio::test]
    async fn empty_report_set_is_not_found() {
        let err = aggregator(vec![]).summarize("005930").await.unwrap_err();
        match err {
            ConsensusError::NotFound(code) => assert_eq!(code, "005930"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn distribution_counts_sum_to_total() {
        let agg = aggregator(vec![
            report(1, "005930", "Buy", dec!(85000), "2024-01-15"),
            report(2, "005930", "Strong Buy", dec!(90000), "2024-01-16"),
            report(3, "005930", "Hold", dec!(95000), "2024-01-17"),
            report(4, "005930", "Sell", dec!(70000), "2024-01-18"),
        ]);

        let summary = agg.summarize("005930").await.unwrap();
        assert_eq!(summary.total_reports, 4);
        assert_eq!(summary.rating_distribution.total(), summary.total_reports);
    }

    #[tokio::test]
    async fn mean_is_unweighted_arithmetic_mean() {
        let agg = aggregator(vec![
            report(1, "035420", "Hold", dec!(100), "2024-01-15"),
            report(2, "035420", "Hold", dec!(200), "2024-01-16"),
            report(3, "035420", "Hold", dec!(300), "2024-01-17"),
        ]);

        let summary = agg.summarize("035420").await.unwrap();
        assert_eq!(summary.average_target_price, dec!(200));
    }

    #[tokio::test]
    async fn mean_rounds_to_two_decimal_places() {
        let agg = aggregator(vec![
            report(1, "035420", "Hold", dec!(100), "2024-01-15"),
            report(2, "035420", "Hold", dec!(100), "2024-01-16"),
            report(3, "035420", "Hold", dec!(101), "2024-01-17"),
        ]);

        let summary = agg.summarize("035420").await.unwrap();
        assert_eq!(summary.average_target_price, dec!(100.33));
    }

    #[tokio::test]
    async fn samsung_scenario_matches_expected_consensus() {
        // 005930 with ratings [buy, buy, hold] and targets [85000, 90000, 95000]
        let agg = aggregator(vec![
            report(1, "005930", "Buy", dec!(85000), "2024-01-15"),
            report(2, "005930", "적극매수", dec!(90000), "2024-01-16"),
            report(3, "005930", "Hold", dec!(95000), "2024-01-17"),
            report(4, "000660", "Sell", dec!(150000), "2024-01-18"),
        ]);

        let summary = agg.summarize("005930").await.unwrap();
        assert_eq!(summary.total_reports, 3);
        assert_eq!(
            summary.rating_distribution,
            RatingDistribution { buy: 2, hold: 1, sell: 0 }
        );
        assert_eq!(summary.average_target_price, dec!(90000));
        assert_eq!(
            summary.latest_report_date,
            "2024-01-17".parse::<NaiveDate>().unwrap()
        );
    }

    #[tokio::test]
    async fn latest_date_ignores_row_order() {
        let agg = aggregator(vec![
            report(1, "005930", "Buy", dec!(85000), "2024-03-01"),
            report(2, "005930", "Buy", dec!(85000), "2024-01-15"),
            report(3, "005930", "Buy", dec!(85000), "2024-02-10"),
        ]);

        let summary = agg.summarize("005930").await.unwrap();
        assert_eq!(
            summary.latest_report_date,
            "2024-03-01".parse::<NaiveDate>().unwrap()
        );
    }
}
