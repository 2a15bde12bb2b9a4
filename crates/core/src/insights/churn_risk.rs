use crate::domain::insight::{Insight, InsightType};
use crate::domain::kpi::format_amount;
use crate::insights::{InsightMiner, PeriodContext};
use crate::storage::repository::CustomerRepository;
use crate::time::period::PeriodWindow;
use serde_json::json;
use std::sync::Arc;

const MAX_AT_RISK: i64 = 20;
const TOP_CUSTOMERS_IN_METADATA: usize = 5;

/// Loyal customers who stopped ordering. Inactivity is measured against the window end.
pub struct ChurnRiskMiner {
    customers: Arc<dyn CustomerRepository>,
    min_orders: i64,
    inactive_days: i64,
}

impl ChurnRiskMiner {
    pub fn new(customers: Arc<dyn CustomerRepository>, min_orders: i64, inactive_days: i64) -> Self {
        Self {
            customers,
            min_orders,
            inactive_days,
        }
    }
}

#[async_trait::async_trait]
impl InsightMiner for ChurnRiskMiner {
    fn name(&self) -> &'static str {
        "churn_risk"
    }

    async fn mine(
        &self,
        company_id: &str,
        window: &PeriodWindow,
        _context: Option<&PeriodContext>,
    ) -> anyhow::Result<Option<Insight>> {
        let mut at_risk = self
            .customers
            .churn_candidates(
                company_id,
                self.min_orders,
                self.inactive_days,
                window.end,
                MAX_AT_RISK,
            )
            .await?;

        // Qualification rule, enforced here as well as in the query.
        at_risk.retain(|c| c.total_orders >= self.min_orders && c.days_inactive > self.inactive_days);
        at_risk.sort_by(|a, b| b.lifetime_value.total_cmp(&a.lifetime_value));
        at_risk.truncate(MAX_AT_RISK as usize);

        if at_risk.is_empty() {
            return Ok(None);
        }

        let total_clv: f64 = at_risk.iter().map(|c| c.lifetime_value).sum();
        let description = match at_risk.as_slice() {
            [only] => format!(
                "{} has not ordered for {} days. Revenue at risk: {}.",
                only.customer_name,
                only.days_inactive,
                format_amount(total_clv)
            ),
            many => format!(
                "{} loyal customers have not ordered for {}+ days. Revenue at risk: {}.",
                many.len(),
                self.inactive_days,
                format_amount(total_clv)
            ),
        };

        let top: Vec<_> = at_risk
            .iter()
            .take(TOP_CUSTOMERS_IN_METADATA)
            .map(|c| {
                json!({
                    "name": c.customer_name,
                    "email": c.email,
                    "phone": c.phone,
                    "lifetime_value": c.lifetime_value,
                    "days_inactive": c.days_inactive,
                    "total_orders": c.total_orders,
                })
            })
            .collect();

        let insight = Insight::new(InsightType::ChurnRisk, "Inactive customers at risk", description, 4)?
            .with_financial_impact(Some(total_clv))
            .with_meta("customer_count", at_risk.len())
            .with_meta("total_clv_at_risk", total_clv)
            .with_meta("min_orders_threshold", self.min_orders)
            .with_meta("inactive_days_threshold", self.inactive_days)
            .with_meta("top_customers", top);
        Ok(Some(insight))
    }
}
