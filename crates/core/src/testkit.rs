//! In-memory fakes for every external collaborator, shared by the unit tests.

use crate::delivery::ReportNotifier;
use crate::domain::report::{HistoryEntry, Report, ReportFrequency};
use crate::llm::TextGenerator;
use crate::storage::repository::{
    ChurnCandidate, Company, CompanyRepository, CustomerRepository, ExpenseRepository,
    HistorySink, ReportTarget, SalesRepository, SalesTotals, StockAlertRow, StockRepository,
};
use crate::time::period::PeriodWindow;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One fake backing all repository roles. Period data is keyed by window start.
#[derive(Debug, Default)]
pub struct FakeRepos {
    pub sales: HashMap<NaiveDate, SalesTotals>,
    pub expenses: HashMap<NaiveDate, f64>,
    pub new_customers: i64,
    pub returning_customers: i64,
    pub stock_rows: Vec<StockAlertRow>,
    pub churn: Vec<ChurnCandidate>,
    pub companies: Vec<Company>,
    pub targets: Vec<ReportTarget>,
    pub fail_sales: bool,
    pub fail_stock: bool,
    pub fail_churn: bool,
    pub sales_calls: AtomicUsize,
}

impl FakeRepos {
    pub fn with_company(mut self, id: &str, name: &str) -> Self {
        self.companies.push(Company {
            id: id.to_string(),
            name: name.to_string(),
            currency_code: None,
        });
        self
    }

    /// Sets the currency of the most recently added company.
    pub fn with_currency(mut self, code: &str) -> Self {
        if let Some(company) = self.companies.last_mut() {
            company.currency_code = Some(code.to_string());
        }
        self
    }

    pub fn with_sales(mut self, start: NaiveDate, revenue: f64, order_count: i64) -> Self {
        self.sales.insert(start, SalesTotals { revenue, order_count });
        self
    }

    pub fn with_expenses(mut self, start: NaiveDate, amount: f64) -> Self {
        self.expenses.insert(start, amount);
        self
    }

    pub fn with_customers(mut self, new_customers: i64, returning_customers: i64) -> Self {
        self.new_customers = new_customers;
        self.returning_customers = returning_customers;
        self
    }

    pub fn with_stock(mut self, name: &str, stock_total: f64, quantity_alert: f64) -> Self {
        self.stock_rows.push(StockAlertRow {
            product_name: name.to_string(),
            stock_total,
            quantity_alert,
        });
        self
    }

    pub fn with_churn(mut self, name: &str, total_orders: i64, lifetime_value: f64, days: i64) -> Self {
        self.churn.push(ChurnCandidate {
            customer_name: name.to_string(),
            email: None,
            phone: None,
            total_orders,
            lifetime_value,
            days_inactive: days,
        });
        self
    }

    pub fn with_target(mut self, company_id: &str, recipient: Option<&str>) -> Self {
        self.targets.push(ReportTarget {
            company_id: company_id.to_string(),
            frequency: ReportFrequency::Monthly,
            recipient: recipient.map(str::to_string),
        });
        self
    }
}

#[async_trait::async_trait]
impl SalesRepository for FakeRepos {
    async fn sales_totals(&self, _: &str, window: &PeriodWindow) -> anyhow::Result<SalesTotals> {
        self.sales_calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(!self.fail_sales, "orders table unavailable");
        Ok(self.sales.get(&window.start).copied().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl CustomerRepository for FakeRepos {
    async fn count_new_customers(&self, _: &str, _: &PeriodWindow) -> anyhow::Result<i64> {
        Ok(self.new_customers)
    }

    async fn count_returning_customers(&self, _: &str, _: &PeriodWindow) -> anyhow::Result<i64> {
        Ok(self.returning_customers)
    }

    async fn churn_candidates(
        &self,
        _: &str,
        min_orders: i64,
        inactive_days: i64,
        _: NaiveDate,
        limit: i64,
    ) -> anyhow::Result<Vec<ChurnCandidate>> {
        anyhow::ensure!(!self.fail_churn, "customers query timed out");
        let mut rows: Vec<ChurnCandidate> = self
            .churn
            .iter()
            .filter(|c| c.total_orders >= min_orders && c.days_inactive > inactive_days)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.lifetime_value.total_cmp(&a.lifetime_value));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl StockRepository for FakeRepos {
    async fn count_stock_alerts(&self, _: &str) -> anyhow::Result<i64> {
        anyhow::ensure!(!self.fail_stock, "stocks query failed");
        Ok(self.stock_rows.len() as i64)
    }

    async fn stock_alerts(&self, _: &str, limit: i64) -> anyhow::Result<Vec<StockAlertRow>> {
        anyhow::ensure!(!self.fail_stock, "stocks query failed");
        let mut rows = self.stock_rows.clone();
        rows.sort_by(|a, b| a.stock_total.total_cmp(&b.stock_total));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl ExpenseRepository for FakeRepos {
    async fn total_expenses(&self, _: &str, window: &PeriodWindow) -> anyhow::Result<f64> {
        Ok(self.expenses.get(&window.start).copied().unwrap_or(0.0))
    }
}

#[async_trait::async_trait]
impl CompanyRepository for FakeRepos {
    async fn company(&self, company_id: &str) -> anyhow::Result<Option<Company>> {
        Ok(self.companies.iter().find(|c| c.id == company_id).cloned())
    }

    async fn active_report_targets(&self, frequency: ReportFrequency) -> anyhow::Result<Vec<ReportTarget>> {
        Ok(self
            .targets
            .iter()
            .filter(|t| t.frequency == frequency)
            .cloned()
            .collect())
    }
}

/// Replays scripted responses in order; errors once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _: &str, _: u32, _: f32) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl ReportNotifier for RecordingNotifier {
    fn channel(&self) -> crate::domain::report::DeliveryMethod {
        crate::domain::report::DeliveryMethod::Telegram
    }

    async fn send(&self, recipient: &str, report: &Report) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail, "telegram returned 502");
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), report.company_id.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    pub entries: Mutex<Vec<HistoryEntry>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl HistorySink for MemoryHistory {
    async fn record(&self, entry: &HistoryEntry) -> anyhow::Result<uuid::Uuid> {
        anyhow::ensure!(!self.fail, "report_history insert failed");
        self.entries.lock().unwrap().push(entry.clone());
        Ok(uuid::Uuid::new_v4())
    }
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}
