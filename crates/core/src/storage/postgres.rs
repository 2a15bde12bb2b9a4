use crate::domain::report::ReportFrequency;
use crate::storage::repository::{
    ChurnCandidate, Company, CompanyRepository, CustomerRepository, ExpenseRepository,
    ReportTarget, SalesRepository, SalesTotals, StockAlertRow, StockRepository,
};
use crate::time::period::PeriodWindow;
use anyhow::Context;
use chrono::NaiveDate;

/// Read-only aggregate queries over the business schema. Every role shares one pool.
#[derive(Debug, Clone)]
pub struct PgRepositories {
    pool: sqlx::PgPool,
}

impl PgRepositories {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SalesRepository for PgRepositories {
    async fn sales_totals(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<SalesTotals> {
        let (revenue, order_count): (f64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::float8, COUNT(*) \
             FROM orders \
             WHERE company_id = $1 \
               AND created_at >= $2 AND created_at < $3 \
               AND deleted_at IS NULL \
               AND status <> 'cancelled'",
        )
        .bind(company_id)
        .bind(window.start)
        .bind(window.end_exclusive())
        .fetch_one(&self.pool)
        .await
        .context("select sales totals failed")?;

        Ok(SalesTotals {
            revenue,
            order_count,
        })
    }
}

#[async_trait::async_trait]
impl CustomerRepository for PgRepositories {
    async fn count_new_customers(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(DISTINCT id) FROM customers \
             WHERE company_id = $1 \
               AND created_at >= $2 AND created_at < $3 \
               AND deleted_at IS NULL",
        )
        .bind(company_id)
        .bind(window.start)
        .bind(window.end_exclusive())
        .fetch_one(&self.pool)
        .await
        .context("count new customers failed")
    }

    async fn count_returning_customers(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(DISTINCT o.customer_id) FROM orders o \
             WHERE o.company_id = $1 \
               AND o.created_at >= $2 AND o.created_at < $3 \
               AND o.deleted_at IS NULL \
               AND o.status <> 'cancelled' \
               AND EXISTS ( \
                 SELECT 1 FROM orders p \
                 WHERE p.company_id = $1 \
                   AND p.customer_id = o.customer_id \
                   AND p.created_at < $2 \
                   AND p.deleted_at IS NULL \
               )",
        )
        .bind(company_id)
        .bind(window.start)
        .bind(window.end_exclusive())
        .fetch_one(&self.pool)
        .await
        .context("count returning customers failed")
    }

    async fn churn_candidates(
        &self,
        company_id: &str,
        min_orders: i64,
        inactive_days: i64,
        as_of: NaiveDate,
        limit: i64,
    ) -> anyhow::Result<Vec<ChurnCandidate>> {
        let rows: Vec<(String, Option<String>, Option<String>, i64, f64, i64)> = sqlx::query_as(
            "SELECT \
               CONCAT(c.first_name, ' ', c.last_name), \
               c.email, \
               c.phone, \
               COUNT(o.id), \
               COALESCE(SUM(o.amount), 0)::float8, \
               ($4::date - MAX(o.created_at)::date)::int8 AS days_inactive \
             FROM customers c \
             JOIN orders o ON o.customer_id = c.id \
             WHERE c.company_id = $1 \
               AND c.deleted_at IS NULL \
               AND o.deleted_at IS NULL \
               AND o.status <> 'cancelled' \
             GROUP BY c.id, c.first_name, c.last_name, c.email, c.phone \
             HAVING COUNT(o.id) >= $2 \
                AND ($4::date - MAX(o.created_at)::date) > $3 \
             ORDER BY 5 DESC \
             LIMIT $5",
        )
        .bind(company_id)
        .bind(min_orders)
        .bind(inactive_days as i32)
        .bind(as_of)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select churn candidates failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(customer_name, email, phone, total_orders, lifetime_value, days_inactive)| {
                    ChurnCandidate {
                        customer_name: customer_name.trim().to_string(),
                        email,
                        phone,
                        total_orders,
                        lifetime_value,
                        days_inactive,
                    }
                },
            )
            .collect())
    }
}

#[async_trait::async_trait]
impl StockRepository for PgRepositories {
    async fn count_stock_alerts(&self, company_id: &str) -> anyhow::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
               SELECT s.id FROM stocks s \
               LEFT JOIN stock_warehouse sw ON sw.stock_id = s.id \
               WHERE s.company_id = $1 \
               GROUP BY s.id, s.quantity_alert \
               HAVING COALESCE(SUM(sw.quantity), 0) <= s.quantity_alert \
             ) alerts",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
        .context("count stock alerts failed")
    }

    async fn stock_alerts(
        &self,
        company_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<StockAlertRow>> {
        let rows: Vec<(String, f64, f64)> = sqlx::query_as(
            "SELECT s.title, \
                    COALESCE(SUM(sw.quantity), 0)::float8 AS stock_total, \
                    s.quantity_alert::float8 \
             FROM stocks s \
             LEFT JOIN stock_warehouse sw ON sw.stock_id = s.id \
             WHERE s.company_id = $1 \
             GROUP BY s.id, s.title, s.quantity_alert \
             HAVING COALESCE(SUM(sw.quantity), 0) <= s.quantity_alert \
             ORDER BY stock_total ASC \
             LIMIT $2",
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select stock alerts failed")?;

        Ok(rows
            .into_iter()
            .map(|(product_name, stock_total, quantity_alert)| StockAlertRow {
                product_name,
                stock_total,
                quantity_alert,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ExpenseRepository for PgRepositories {
    async fn total_expenses(&self, company_id: &str, window: &PeriodWindow) -> anyhow::Result<f64> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::float8 FROM bills \
             WHERE company_id = $1 \
               AND created_at >= $2 AND created_at < $3 \
               AND deleted_at IS NULL",
        )
        .bind(company_id)
        .bind(window.start)
        .bind(window.end_exclusive())
        .fetch_one(&self.pool)
        .await
        .context("sum expenses failed")
    }
}

#[async_trait::async_trait]
impl CompanyRepository for PgRepositories {
    async fn company(&self, company_id: &str) -> anyhow::Result<Option<Company>> {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, name, currency_code FROM companies WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await
                .context("select company failed")?;

        Ok(row.map(|(id, name, currency_code)| Company {
            id,
            name,
            currency_code,
        }))
    }

    async fn active_report_targets(
        &self,
        frequency: ReportFrequency,
    ) -> anyhow::Result<Vec<ReportTarget>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT company_id, contact_phone FROM report_configs \
             WHERE report_frequency = $1 AND is_active \
             ORDER BY company_id",
        )
        .bind(frequency.as_str())
        .fetch_all(&self.pool)
        .await
        .context("select active report configs failed")?;

        Ok(rows
            .into_iter()
            .map(|(company_id, recipient)| ReportTarget {
                company_id,
                frequency,
                recipient: recipient.filter(|r| !r.trim().is_empty()),
            })
            .collect())
    }
}
