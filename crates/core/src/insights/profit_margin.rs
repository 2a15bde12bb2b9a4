use crate::domain::insight::{Insight, InsightType};
use crate::domain::kpi::format_amount;
use crate::insights::{InsightMiner, PeriodContext};
use crate::storage::repository::{ExpenseRepository, SalesRepository};
use crate::time::period::PeriodWindow;
use std::sync::Arc;

const THIN_MARGIN_PCT: f64 = 10.0;
const STRONG_MARGIN_PCT: f64 = 40.0;

pub struct ProfitMarginMiner {
    sales: Arc<dyn SalesRepository>,
    expenses: Arc<dyn ExpenseRepository>,
}

impl ProfitMarginMiner {
    pub fn new(sales: Arc<dyn SalesRepository>, expenses: Arc<dyn ExpenseRepository>) -> Self {
        Self { sales, expenses }
    }
}

#[async_trait::async_trait]
impl InsightMiner for ProfitMarginMiner {
    fn name(&self) -> &'static str {
        "profit_margin"
    }

    async fn mine(
        &self,
        company_id: &str,
        window: &PeriodWindow,
        context: Option<&PeriodContext>,
    ) -> anyhow::Result<Option<Insight>> {
        let (revenue, expenses, net) = match context {
            Some(ctx) => (ctx.revenue, ctx.expenses, ctx.net_result),
            None => {
                let revenue = self.sales.sales_totals(company_id, window).await?.revenue;
                let expenses = self.expenses.total_expenses(company_id, window).await?;
                (revenue, expenses, revenue - expenses)
            }
        };

        if revenue == 0.0 {
            return Ok(None);
        }

        let margin = net / revenue * 100.0;

        let insight = if margin < 0.0 {
            Insight::new(
                InsightType::ProfitMargin,
                "Operating at a loss",
                format!(
                    "Expenses ({}) exceed revenue ({}). Loss: {}. Cut costs urgently.",
                    format_amount(expenses),
                    format_amount(revenue),
                    format_amount(net.abs())
                ),
                5,
            )?
            .with_financial_impact(Some(net.abs()))
        } else if margin < THIN_MARGIN_PCT {
            Insight::new(
                InsightType::ProfitMargin,
                "Thin profit margin",
                format!(
                    "Profit margin is only {margin:.1}%. Trim expenses or raise prices to improve profitability."
                ),
                4,
            )?
        } else if margin > STRONG_MARGIN_PCT {
            Insight::new(
                InsightType::ProfitMargin,
                "Excellent profitability",
                format!(
                    "Congratulations, profit margin reached {margin:.1}%. Use this headroom to invest in growth."
                ),
                2,
            )?
        } else {
            return Ok(None);
        };

        Ok(Some(
            insight
                .with_meta("profit_margin", margin)
                .with_meta("total_revenue", revenue)
                .with_meta("total_expenses", expenses)
                .with_meta("net_result", net)
                .with_meta("expense_ratio", expenses / revenue * 100.0),
        ))
    }
}
