use crate::domain::insight::{Insight, InsightType};
use crate::insights::{InsightMiner, PeriodContext};
use crate::kpi::variation_pct;
use crate::storage::repository::SalesRepository;
use crate::time::period::PeriodWindow;
use std::sync::Arc;

/// Revenue swing against the previous window of the same length.
pub struct SeasonalityMiner {
    sales: Arc<dyn SalesRepository>,
    threshold_pct: f64,
}

impl SeasonalityMiner {
    pub fn new(sales: Arc<dyn SalesRepository>, threshold_pct: f64) -> Self {
        Self {
            sales,
            threshold_pct,
        }
    }
}

#[async_trait::async_trait]
impl InsightMiner for SeasonalityMiner {
    fn name(&self) -> &'static str {
        "seasonality"
    }

    async fn mine(
        &self,
        company_id: &str,
        window: &PeriodWindow,
        context: Option<&PeriodContext>,
    ) -> anyhow::Result<Option<Insight>> {
        let previous_window = window.previous();

        let current = match context {
            Some(ctx) => ctx.revenue,
            None => self.sales.sales_totals(company_id, window).await?.revenue,
        };
        let previous = self
            .sales
            .sales_totals(company_id, &previous_window)
            .await?
            .revenue;

        // No baseline.
        if previous == 0.0 {
            return Ok(None);
        }

        let variation = variation_pct(current, previous);
        if variation.abs() < self.threshold_pct {
            return Ok(None);
        }

        let is_increase = variation > 0.0;
        let delta = (current - previous).abs();
        let (title, verb, advice) = if is_increase {
            ("Seasonal upswing", "rose", "Build on this momentum.")
        } else {
            ("Seasonal downturn", "fell", "Plan ahead for this trend.")
        };
        let description = format!(
            "Sales {verb} {:.0}% vs {}. {advice}",
            variation.abs(),
            previous_window.previous_phrase()
        );

        let insight = Insight::new(InsightType::Seasonality, title, description, 3)?
            .with_financial_impact((!is_increase).then_some(delta))
            .with_meta("variation_percentage", variation)
            .with_meta("current_revenue", current)
            .with_meta("previous_revenue", previous)
            .with_meta("delta", delta)
            .with_meta("is_increase", is_increase)
            .with_meta("current_period", format!("{} to {}", window.start, window.end))
            .with_meta(
                "previous_period",
                format!("{} to {}", previous_window.start, previous_window.end),
            );
        Ok(Some(insight))
    }
}
