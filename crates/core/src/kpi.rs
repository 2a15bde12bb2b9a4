use crate::domain::kpi::{KpiComparison, KpiSnapshot};
use crate::storage::repository::{
    CustomerRepository, ExpenseRepository, SalesRepository, StockRepository,
};
use crate::time::period::PeriodWindow;
use anyhow::Context;
use std::sync::Arc;

/// Percentage change from `previous` to `current`.
///
/// A zero baseline yields `100` when `current` is positive and `0` otherwise.
pub fn variation_pct(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

pub fn compare_snapshots(current: &KpiSnapshot, previous: &KpiSnapshot) -> KpiComparison {
    KpiComparison {
        revenue_variation_pct: variation_pct(current.revenue, previous.revenue),
        order_variation_pct: variation_pct(current.order_count as f64, previous.order_count as f64),
        expense_variation_pct: variation_pct(current.expenses, previous.expenses),
        returning_customers_delta: current.returning_customers - previous.returning_customers,
    }
}

/// Net refunds can push a window's total below zero; reports treat that as no activity.
fn non_negative(company_id: &str, metric: &'static str, amount: f64) -> f64 {
    if amount < 0.0 {
        tracing::warn!(company_id, metric, amount, "negative aggregate clamped to 0");
        return 0.0;
    }
    amount
}

#[derive(Clone)]
pub struct KpiEngine {
    sales: Arc<dyn SalesRepository>,
    customers: Arc<dyn CustomerRepository>,
    stock: Arc<dyn StockRepository>,
    expenses: Arc<dyn ExpenseRepository>,
}

impl KpiEngine {
    pub fn new(
        sales: Arc<dyn SalesRepository>,
        customers: Arc<dyn CustomerRepository>,
        stock: Arc<dyn StockRepository>,
        expenses: Arc<dyn ExpenseRepository>,
    ) -> Self {
        Self {
            sales,
            customers,
            stock,
            expenses,
        }
    }

    pub async fn calculate(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<KpiSnapshot> {
        let sales = self
            .sales
            .sales_totals(company_id, window)
            .await
            .context("sales totals unavailable")?;
        let new_customers = self
            .customers
            .count_new_customers(company_id, window)
            .await
            .context("new customer count unavailable")?;
        let returning_customers = self
            .customers
            .count_returning_customers(company_id, window)
            .await
            .context("returning customer count unavailable")?;
        let stock_alert_count = self
            .stock
            .count_stock_alerts(company_id)
            .await
            .context("stock alert count unavailable")?;
        let expenses = self
            .expenses
            .total_expenses(company_id, window)
            .await
            .context("expense total unavailable")?;

        let revenue = non_negative(company_id, "revenue", sales.revenue);
        let expenses = non_negative(company_id, "expenses", expenses);
        let kpis = KpiSnapshot::from_parts(
            revenue,
            sales.order_count,
            new_customers,
            returning_customers,
            stock_alert_count,
            expenses,
        )?;

        tracing::debug!(
            company_id,
            start = %window.start,
            end = %window.end,
            revenue = kpis.revenue,
            orders = kpis.order_count,
            net_result = kpis.net_result,
            "kpis calculated"
        );
        Ok(kpis)
    }

    /// Calculates `window` and its previous window, then diffs them.
    pub async fn compare(
        &self,
        company_id: &str,
        window: &PeriodWindow,
    ) -> anyhow::Result<KpiComparison> {
        let current = self.calculate(company_id, window).await?;
        let previous = self.calculate(company_id, &window.previous()).await?;
        Ok(compare_snapshots(&current, &previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{d, FakeRepos};

    fn engine(repos: FakeRepos) -> KpiEngine {
        let repos = Arc::new(repos);
        KpiEngine::new(repos.clone(), repos.clone(), repos.clone(), repos)
    }

    #[test]
    fn zero_baseline_rule() {
        assert_eq!(variation_pct(10.0, 0.0), 100.0);
        assert_eq!(variation_pct(0.0, 0.0), 0.0);
        assert_eq!(variation_pct(150.0, 100.0), 50.0);
        assert_eq!(variation_pct(75.0, 100.0), -25.0);
    }

    #[tokio::test]
    async fn calculate_derives_net_result() {
        let july = PeriodWindow::new(d(2025, 7, 1), d(2025, 7, 31)).unwrap();
        let e = engine(
            FakeRepos::default()
                .with_sales(july.start, 1_000_000.0, 40)
                .with_expenses(july.start, 1_050_000.0)
                .with_customers(3, 7)
                .with_stock("Rice 25kg", 0.0, 5.0),
        );

        let k = e.calculate("c1", &july).await.unwrap();
        assert_eq!(k.revenue, 1_000_000.0);
        assert_eq!(k.order_count, 40);
        assert_eq!(k.stock_alert_count, 1);
        assert_eq!(k.net_result, -50_000.0);
    }

    #[tokio::test]
    async fn compare_uses_previous_window() {
        let july = PeriodWindow::new(d(2025, 7, 1), d(2025, 7, 31)).unwrap();
        let prev = july.previous();
        let e = engine(
            FakeRepos::default()
                .with_sales(july.start, 1_200.0, 12)
                .with_sales(prev.start, 1_000.0, 0)
                .with_expenses(july.start, 300.0),
        );

        let c = e.compare("c1", &july).await.unwrap();
        assert!((c.revenue_variation_pct - 20.0).abs() < 1e-9);
        assert_eq!(c.order_variation_pct, 100.0);
        assert_eq!(c.expense_variation_pct, 100.0);
        assert_eq!(c.returning_customers_delta, 0);
    }

    #[tokio::test]
    async fn negative_aggregates_are_clamped() {
        let july = PeriodWindow::new(d(2025, 7, 1), d(2025, 7, 31)).unwrap();
        let e = engine(
            FakeRepos::default()
                .with_sales(july.start, -10_000.0, 3)
                .with_expenses(july.start, -250.0),
        );

        let k = e.calculate("c1", &july).await.unwrap();
        assert_eq!(k.revenue, 0.0);
        assert_eq!(k.expenses, 0.0);
        assert_eq!(k.net_result, 0.0);
        assert_eq!(k.order_count, 3);
    }

    #[tokio::test]
    async fn repository_failure_propagates() {
        let july = PeriodWindow::new(d(2025, 7, 1), d(2025, 7, 31)).unwrap();
        let e = engine(FakeRepos {
            fail_sales: true,
            ..Default::default()
        });
        let err = e.calculate("c1", &july).await.unwrap_err();
        assert!(format!("{err:#}").contains("sales totals unavailable"));
    }
}
