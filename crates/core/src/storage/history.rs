use crate::domain::report::{HistoryEntry, ReportStatus};
use crate::storage::repository::HistorySink;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgHistorySink {
    pool: sqlx::PgPool,
}

/// Summary row returned by the history listing; the archived report body is left out.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub id: Uuid,
    pub frequency: String,
    pub as_of_date: NaiveDate,
    pub status: String,
    pub delivered: bool,
    pub error: Option<String>,
    pub elapsed_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl PgHistorySink {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_recent(&self, company_id: &str, limit: i64) -> anyhow::Result<Vec<HistoryRow>> {
        anyhow::ensure!((1..=100).contains(&limit), "limit must be 1..=100");

        let rows: Vec<(Uuid, String, NaiveDate, String, bool, Option<String>, i64, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, frequency, as_of_date, status, delivered, error, elapsed_ms, created_at \
                 FROM report_history \
                 WHERE company_id = $1 \
                 ORDER BY created_at DESC \
                 LIMIT $2",
            )
            .bind(company_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("select report_history failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, frequency, as_of_date, status, delivered, error, elapsed_ms, created_at)| {
                    HistoryRow {
                        id,
                        frequency,
                        as_of_date,
                        status,
                        delivered,
                        error,
                        elapsed_ms,
                        created_at,
                    }
                },
            )
            .collect())
    }
}

#[async_trait::async_trait]
impl HistorySink for PgHistorySink {
    async fn record(&self, entry: &HistoryEntry) -> anyhow::Result<Uuid> {
        if entry.status == ReportStatus::Success {
            anyhow::ensure!(entry.report.is_some(), "success history entry must carry the report");
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO report_history \
               (id, company_id, frequency, as_of_date, status, delivery_method, recipient, \
                delivered, report, error, elapsed_ms, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(id)
        .bind(&entry.company_id)
        .bind(entry.frequency.as_str())
        .bind(entry.as_of_date)
        .bind(entry.status.as_str())
        .bind(entry.delivery_method.map(|m| m.as_str()))
        .bind(entry.recipient.as_deref())
        .bind(entry.delivered)
        .bind(entry.report.as_ref())
        .bind(entry.error.as_deref())
        .bind(entry.elapsed_ms)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("insert report_history failed")?;

        Ok(id)
    }
}
