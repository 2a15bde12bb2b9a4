use crate::domain::insight::Insight;
use crate::domain::kpi::KpiSnapshot;
use crate::time::period::PeriodWindow;
use std::sync::Arc;

pub mod churn_risk;
pub mod profit_margin;
pub mod ranker;
pub mod seasonality;
pub mod stock_alert;

pub use churn_risk::ChurnRiskMiner;
pub use profit_margin::ProfitMarginMiner;
pub use ranker::{InsightRanker, RankingWeights};
pub use seasonality::SeasonalityMiner;
pub use stock_alert::StockAlertMiner;

/// Precomputed figures for the current window that miners may read instead of re-querying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodContext {
    pub revenue: f64,
    pub order_count: i64,
    pub expenses: f64,
    pub net_result: f64,
}

impl From<&KpiSnapshot> for PeriodContext {
    fn from(k: &KpiSnapshot) -> Self {
        Self {
            revenue: k.revenue,
            order_count: k.order_count,
            expenses: k.expenses,
            net_result: k.net_result,
        }
    }
}

impl PeriodContext {
    pub fn average_revenue_per_sale(&self) -> f64 {
        if self.order_count > 0 {
            self.revenue / self.order_count as f64
        } else {
            0.0
        }
    }
}

#[async_trait::async_trait]
pub trait InsightMiner: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means nothing noteworthy in this window.
    async fn mine(
        &self,
        company_id: &str,
        window: &PeriodWindow,
        context: Option<&PeriodContext>,
    ) -> anyhow::Result<Option<Insight>>;
}

/// Runs every miner in registration order. A failing miner is logged and contributes nothing.
pub async fn mine_all(
    miners: &[Arc<dyn InsightMiner>],
    company_id: &str,
    window: &PeriodWindow,
    context: Option<&PeriodContext>,
) -> Vec<Insight> {
    let mut out = Vec::with_capacity(miners.len());
    for miner in miners {
        match miner.mine(company_id, window, context).await {
            Ok(Some(insight)) => {
                tracing::info!(
                    company_id,
                    miner = miner.name(),
                    kind = insight.kind.as_str(),
                    priority = insight.priority,
                    financial_impact = ?insight.financial_impact,
                    "insight detected"
                );
                out.push(insight);
            }
            Ok(None) => {
                tracing::debug!(company_id, miner = miner.name(), "no insight");
            }
            Err(err) => {
                tracing::warn!(company_id, miner = miner.name(), error = %format!("{err:#}"), "miner failed; skipping");
            }
        }
    }
    out
}
