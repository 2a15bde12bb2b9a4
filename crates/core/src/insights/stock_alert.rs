use crate::domain::insight::{Insight, InsightType};
use crate::insights::{InsightMiner, PeriodContext};
use crate::storage::repository::StockRepository;
use crate::time::period::PeriodWindow;
use serde_json::json;
use std::sync::Arc;

const ALERT_ROW_LIMIT: i64 = 10;
const PRODUCTS_IN_METADATA: usize = 5;

/// Out-of-stock (priority 5) and low-stock (priority 3) products. Stock is point-in-time,
/// so the window is ignored.
pub struct StockAlertMiner {
    stock: Arc<dyn StockRepository>,
    assumed_lost_sales: f64,
}

impl StockAlertMiner {
    pub fn new(stock: Arc<dyn StockRepository>, assumed_lost_sales: f64) -> Self {
        Self {
            stock,
            assumed_lost_sales,
        }
    }
}

#[async_trait::async_trait]
impl InsightMiner for StockAlertMiner {
    fn name(&self) -> &'static str {
        "stock_alert"
    }

    async fn mine(
        &self,
        company_id: &str,
        _window: &PeriodWindow,
        context: Option<&PeriodContext>,
    ) -> anyhow::Result<Option<Insight>> {
        let alerts = self.stock.stock_alerts(company_id, ALERT_ROW_LIMIT).await?;
        let Some(first) = alerts.first() else {
            return Ok(None);
        };

        let critical: Vec<_> = alerts.iter().filter(|a| a.is_critical()).collect();

        let (title, description, priority) = match critical.as_slice() {
            [] => (
                "Low stock",
                format!(
                    "'{}': {:.0} units left (alert threshold {:.0}).",
                    first.product_name, first.stock_total, first.quantity_alert
                ),
                3,
            ),
            [only] => (
                "Out of stock",
                format!("'{}' is completely out of stock.", only.product_name),
                5,
            ),
            many => (
                "Out of stock",
                format!("{} products are completely out of stock.", many.len()),
                5,
            ),
        };

        let financial_impact = context.map(|ctx| {
            critical.len() as f64 * self.assumed_lost_sales * ctx.average_revenue_per_sale()
        });

        let products: Vec<_> = alerts
            .iter()
            .take(PRODUCTS_IN_METADATA)
            .map(|a| {
                json!({
                    "name": a.product_name,
                    "stock": a.stock_total,
                    "alert_level": a.alert_level(),
                })
            })
            .collect();

        let insight = Insight::new(InsightType::StockAlert, title, description, priority)?
            .with_financial_impact(financial_impact)
            .with_meta("total_alerts", alerts.len())
            .with_meta("critical_alerts", critical.len())
            .with_meta("products", products);
        Ok(Some(insight))
    }
}
