use crate::domain::report::{HistoryEntry, ReportFrequency};
use crate::time::period::PeriodWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalesTotals {
    pub revenue: f64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlertRow {
    pub product_name: String,
    pub stock_total: f64,
    pub quantity_alert: f64,
}

impl StockAlertRow {
    pub fn is_critical(&self) -> bool {
        self.stock_total <= 0.0
    }

    pub fn alert_level(&self) -> &'static str {
        if self.is_critical() {
            "critical"
        } else if self.stock_total <= self.quantity_alert * 0.5 {
            "high"
        } else {
            "medium"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnCandidate {
    pub customer_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub total_orders: i64,
    pub lifetime_value: f64,
    pub days_inactive: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub currency_code: Option<String>,
}

/// Active schedule entry: who receives which company's report, and how often.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTarget {
    pub company_id: String,
    pub frequency: ReportFrequency,
    pub recipient: Option<String>,
}

// Every period query below covers `[window.start, window.end_exclusive())`.

#[async_trait::async_trait]
pub trait SalesRepository: Send + Sync {
    async fn sales_totals(&self, company_id: &str, window: &PeriodWindow)
        -> anyhow::Result<SalesTotals>;
}

#[async_trait::async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn count_new_customers(&self, company_id: &str, window: &PeriodWindow)
        -> anyhow::Result<i64>;

    /// Customers ordering in the window who had also ordered before it.
    async fn count_returning_customers(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<i64>;

    /// Loyal customers inactive for more than `inactive_days` as of `as_of`,
    /// ordered by lifetime value descending.
    async fn churn_candidates(
        &self,
        company_id: &str,
        min_orders: i64,
        inactive_days: i64,
        as_of: NaiveDate,
        limit: i64,
    ) -> anyhow::Result<Vec<ChurnCandidate>>;
}

#[async_trait::async_trait]
pub trait StockRepository: Send + Sync {
    async fn count_stock_alerts(&self, company_id: &str) -> anyhow::Result<i64>;

    /// Rows with `stock_total <= quantity_alert`, lowest stock first.
    async fn stock_alerts(&self, company_id: &str, limit: i64)
        -> anyhow::Result<Vec<StockAlertRow>>;
}

#[async_trait::async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn total_expenses(&self, company_id: &str, window: &PeriodWindow) -> anyhow::Result<f64>;
}

#[async_trait::async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn company(&self, company_id: &str) -> anyhow::Result<Option<Company>>;

    async fn active_report_targets(
        &self,
        frequency: ReportFrequency,
    ) -> anyhow::Result<Vec<ReportTarget>>;
}

#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> anyhow::Result<uuid::Uuid>;
}
