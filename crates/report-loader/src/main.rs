//! report-loader: Seed consensus reports and their embeddings into SQLite.
//!
//! In a real deployment the report feed comes from brokerage research APIs;
//! this binary ships a demonstration set of Korean large-cap reports so the
//! aggregation and search paths have data to work against.
//!
//! Usage:
//!   cargo run -p report-loader
//!   cargo run -p report-loader -- --db consensus.db
//!   cargo run -p report-loader -- --dry-run

use consensus_core::{ReportInput, TextEncoder};
use embedding_client::EmbeddingClient;
use ingest_service::IngestService;
use report_store::{ConsensusDb, EmbeddingStore, ReportStore};
use rust_decimal::Decimal;
use std::sync::Arc;

fn sample_reports() -> Vec<ReportInput> {
    let rows: Vec<(&str, &str, &str, i64, &str, &str)> = vec![
        (
            "005930",
            "미래에셋증권",
            "Buy",
            85000,
            "2024-01-15",
            "삼성전자는 메모리 반도체 업황 회복과 함께 견조한 실적이 예상됩니다.",
        ),
        (
            "005930",
            "한국투자증권",
            "Strong Buy",
            90000,
            "2024-01-18",
            "HBM 공급 확대와 파운드리 수율 개선이 실적 반등을 이끌 전망입니다.",
        ),
        (
            "005930",
            "KB증권",
            "Hold",
            95000,
            "2024-01-22",
            "단기 주가 상승으로 밸류에이션 부담이 있어 중립 의견을 유지합니다.",
        ),
        (
            "000660",
            "삼성증권",
            "Strong Buy",
            150000,
            "2024-01-16",
            "AI 수요 증가로 HBM 메모리 수요가 급증하고 있어 긍정적입니다.",
        ),
        (
            "000660",
            "NH투자증권",
            "Buy",
            145000,
            "2024-01-19",
            "DRAM 가격 반등 사이클 진입으로 이익 추정치를 상향합니다.",
        ),
        (
            "035420",
            "NH투자증권",
            "Hold",
            200000,
            "2024-01-17",
            "커머스 사업 성장은 지속되나 경쟁 심화로 수익성 개선이 필요합니다.",
        ),
    ];

    rows.into_iter()
        .map(|(stock_code, firm, rating_raw, price, date, content)| ReportInput {
            stock_code: stock_code.to_string(),
            security_firm: firm.to_string(),
            rating_raw: rating_raw.to_string(),
            target_price: Decimal::from(price),
            report_date: date.parse().expect("sample report date"),
            analysis_content: Some(content.to_string()),
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_loader=info,ingest_service=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let db_path = args
        .iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("consensus.db");

    let samples = sample_reports();

    if dry_run {
        for report in &samples {
            tracing::info!(
                stock_code = %report.stock_code,
                firm = %report.security_firm,
                rating = %report.rating_raw,
                target_price = %report.target_price,
                "would ingest"
            );
        }
        tracing::info!("dry run: {} reports, nothing written", samples.len());
        return Ok(());
    }

    let db = ConsensusDb::new(&format!("sqlite:{db_path}?mode=rwc")).await?;

    // WAL keeps readers unblocked while ingestion writes
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(db.pool())
        .await?;

    let encoder = Arc::new(EmbeddingClient::with_defaults());
    match encoder.health().await {
        Ok(true) => {}
        _ => tracing::warn!(
            "embedding service unreachable; reports will be stored without vectors"
        ),
    }

    let reports = Arc::new(ReportStore::new(db.clone()));
    let embeddings = Arc::new(EmbeddingStore::new(db, encoder.dimension()));
    let service = IngestService::new(reports, embeddings, encoder);

    tracing::info!(db = db_path, count = samples.len(), "ingesting sample reports");
    let outcome = service.ingest_batch(&samples).await;

    tracing::info!(
        processed = outcome.processed,
        failed = outcome.failed,
        total = outcome.total,
        "ingestion complete"
    );

    Ok(())
}
