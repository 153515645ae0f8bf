use async_trait::async_trait;
use chrono::NaiveDate;
use consensus_core::{ConsensusError, Rating, Report, ReportInput, ReportRepository};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::db::{store_err, ConsensusDb};

const SELECT_COLUMNS: &str = "id, stock_code, security_firm, rating_raw, rating_norm, \
     target_price, report_date, created_at";

/// Raw persisted row; prices, dates and ratings are stored as text and
/// validated on the way out so a malformed row fails loudly instead of
/// skewing downstream aggregates.
#[derive(Debug, FromRow)]
pub(crate) struct ReportRow {
    pub(crate) id: i64,
    pub(crate) stock_code: String,
    pub(crate) security_firm: String,
    pub(crate) rating_raw: String,
    pub(crate) rating_norm: String,
    pub(crate) target_price: String,
    pub(crate) report_date: String,
    pub(crate) created_at: String,
}

impl TryFrom<ReportRow> for Report {
    type Error = ConsensusError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let rating: Rating = row.rating_norm.parse()?;

        let target_price: Decimal = row.target_price.parse().map_err(|_| {
            ConsensusError::CorruptRow(format!(
                "report {}: unparseable target price {:?}",
                row.id, row.target_price
            ))
        })?;

        let report_date: NaiveDate = row.report_date.parse().map_err(|_| {
            ConsensusError::CorruptRow(format!(
                "report {}: unparseable report date {:?}",
                row.id, row.report_date
            ))
        })?;

        // SQLite datetime('now') format
        let created_at = chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
            .map_err(|_| {
                ConsensusError::CorruptRow(format!(
                    "report {}: unparseable creation timestamp {:?}",
                    row.id, row.created_at
                ))
            })?
            .and_utc();

        Ok(Report {
            id: row.id,
            stock_code: row.stock_code,
            security_firm: row.security_firm,
            rating_raw: row.rating_raw,
            rating,
            target_price,
            report_date,
            created_at,
        })
    }
}

#[derive(Clone)]
pub struct ReportStore {
    db: ConsensusDb,
}

impl ReportStore {
    pub fn new(db: ConsensusDb) -> Self {
        Self { db }
    }

    async fn find_by_key(
        &self,
        stock_code: &str,
        security_firm: &str,
        report_date: NaiveDate,
    ) -> Result<Option<i64>, ConsensusError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM consensus_reports \
             WHERE stock_code = ? AND security_firm = ? AND report_date = ?",
        )
        .bind(stock_code)
        .bind(security_firm)
        .bind(report_date.to_string())
        .fetch_optional(self.db.pool())
        .await
        .map_err(store_err)?;

        Ok(row.map(|(id,)| id))
    }
}

#[async_trait]
impl ReportRepository for ReportStore {
    async fn insert_if_absent(
        &self,
        input: &ReportInput,
        rating: Rating,
    ) -> Result<i64, ConsensusError> {
        let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
            "INSERT INTO consensus_reports \
             (stock_code, security_firm, rating_raw, rating_norm, target_price, report_date) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(&input.stock_code)
        .bind(&input.security_firm)
        .bind(&input.rating_raw)
        .bind(rating.as_str())
        .bind(input.target_price.to_string())
        .bind(input.report_date.to_string())
        .fetch_one(self.db.pool())
        .await;

        match inserted {
            Ok((id,)) => Ok(id),
            // Unique-key race: the loser re-reads the winner's row instead of
            // surfacing a duplicate-key fault.
            Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                tracing::debug!(
                    stock_code = %input.stock_code,
                    firm = %input.security_firm,
                    "report already exists, resolving to stored id"
                );
                self.find_by_key(&input.stock_code, &input.security_firm, input.report_date)
                    .await?
                    .ok_or_else(|| {
                        ConsensusError::Store(
                            "unique violation but existing report not found".to_string(),
                        )
                    })
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn get(&self, id: i64) -> Result<Option<Report>, ConsensusError> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM consensus_reports WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(store_err)?;

        row.map(Report::try_from).transpose()
    }

    async fn load_by_security(&self, stock_code: &str) -> Result<Vec<Report>, ConsensusError> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM consensus_reports \
             WHERE stock_code = ? ORDER BY report_date, id"
        ))
        .bind(stock_code)
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Report::try_from).collect()
    }

    async fn recent(
        &self,
        limit: u32,
        stock_code: Option<&str>,
    ) -> Result<Vec<Report>, ConsensusError> {
        let limit = limit.clamp(1, 100) as i64;

        let rows: Vec<ReportRow> = match stock_code {
            Some(code) => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM consensus_reports \
                     WHERE stock_code = ? ORDER BY created_at DESC, id DESC LIMIT ?"
                ))
                .bind(code)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM consensus_reports \
                     ORDER BY created_at DESC, id DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(self.db.pool())
                .await
            }
        }
        .map_err(store_err)?;

        rows.into_iter().map(Report::try_from).collect()
    }

    async fn list_securities(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<String>, ConsensusError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT stock_code FROM consensus_reports \
             ORDER BY stock_code LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(|(code,)| code).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::normalize_rating;
    use rust_decimal_macros::dec;

    async fn test_store() -> ReportStore {
        let db = ConsensusDb::in_memory().await.unwrap();
        ReportStore::new(db)
    }

    fn input(stock_code: &str, firm: &str, rating_raw: &str, price: Decimal, date: &str) -> ReportInput {
        ReportInput {
            stock_code: stock_code.to_string(),
            security_firm: firm.to_string(),
            rating_raw: rating_raw.to_string(),
            target_price: price,
            report_date: date.parse().unwrap(),
            analysis_content: None,
        }
    }

    async fn ingest(store: &ReportStore, report: &ReportInput) -> i64 {
        store
            .insert_if_absent(report, normalize_rating(&report.rating_raw))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_unique_triple() {
        let store = test_store().await;
        let report = input("005930", "미래에셋증권", "Buy", dec!(85000), "2024-01-15");

        let first = ingest(&store, &report).await;
        let second = ingest(&store, &report).await;
        assert_eq!(first, second);

        let rows = store.load_by_security("005930").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn same_firm_different_date_is_a_new_row() {
        let store = test_store().await;
        let first = ingest(&store, &input("005930", "미래에셋증권", "Buy", dec!(85000), "2024-01-15")).await;
        let second = ingest(&store, &input("005930", "미래에셋증권", "Buy", dec!(86000), "2024-01-22")).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn loaded_report_round_trips_fields() {
        let store = test_store().await;
        let id = ingest(&store, &input("005930", "삼성증권", "Strong Buy", dec!(90000.50), "2024-01-16")).await;

        let report = store.get(id).await.unwrap().unwrap();
        assert_eq!(report.stock_code, "005930");
        assert_eq!(report.security_firm, "삼성증권");
        assert_eq!(report.rating_raw, "Strong Buy");
        assert_eq!(report.rating, Rating::Buy);
        assert_eq!(report.target_price, dec!(90000.50));
        assert_eq!(report.report_date, "2024-01-16".parse::<NaiveDate>().unwrap());
    }

    #[tokio::test]
    async fn get_missing_report_is_none() {
        let store = test_store().await;
        assert!(store.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_by_security_only_returns_that_security() {
        let store = test_store().await;
        ingest(&store, &input("005930", "미래에셋증권", "Buy", dec!(85000), "2024-01-15")).await;
        ingest(&store, &input("000660", "삼성증권", "Hold", dec!(150000), "2024-01-16")).await;

        let rows = store.load_by_security("005930").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock_code, "005930");

        assert!(store.load_by_security("035420").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_orders_newest_first_and_honors_filter() {
        let store = test_store().await;
        let a = ingest(&store, &input("005930", "미래에셋증권", "Buy", dec!(85000), "2024-01-15")).await;
        let b = ingest(&store, &input("000660", "삼성증권", "Buy", dec!(150000), "2024-01-16")).await;

        // Same created_at second is possible in-memory; id DESC breaks the tie.
        let all = store.recent(10, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);
        assert_eq!(all[1].id, a);

        let filtered = store.recent(10, Some("005930")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, a);
    }

    #[tokio::test]
    async fn list_securities_is_distinct_and_paged() {
        let store = test_store().await;
        ingest(&store, &input("005930", "미래에셋증권", "Buy", dec!(85000), "2024-01-15")).await;
        ingest(&store, &input("005930", "삼성증권", "Hold", dec!(88000), "2024-01-16")).await;
        ingest(&store, &input("000660", "NH투자증권", "Buy", dec!(150000), "2024-01-17")).await;

        let all = store.list_securities(50, 0).await.unwrap();
        assert_eq!(all, vec!["000660".to_string(), "005930".to_string()]);

        let page = store.list_securities(1, 1).await.unwrap();
        assert_eq!(page, vec!["005930".to_string()]);
    }

    #[tokio::test]
    async fn malformed_stored_price_fails_the_load() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO consensus_reports \
             (stock_code, security_firm, rating_raw, rating_norm, target_price, report_date) \
             VALUES ('005930', '미래에셋증권', 'Buy', 'buy', 'not-a-price', '2024-01-15')",
        )
        .execute(store.db.pool())
        .await
        .unwrap();

        let err = store.load_by_security("005930").await.unwrap_err();
        assert!(matches!(err, ConsensusError::CorruptRow(_)));
    }
}
