use crate::config::ReportSettings;
use crate::domain::insight::Insight;
use crate::domain::report::{Report, ReportFrequency, DEFAULT_CURRENCY};
use crate::insights::{
    mine_all, ChurnRiskMiner, InsightMiner, InsightRanker, PeriodContext, ProfitMarginMiner,
    RankingWeights, SeasonalityMiner, StockAlertMiner,
};
use crate::kpi::{compare_snapshots, KpiEngine};
use crate::recommend::{PromptInput, RecommendationSynthesizer};
use crate::storage::repository::{
    CompanyRepository, CustomerRepository, ExpenseRepository, ReportTarget, SalesRepository,
    StockRepository,
};
use crate::time::period;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

pub mod error;
pub mod runner;

pub use error::ReportError;
pub use runner::{BatchSummary, ReportJob, ReportRunner, RunOutcome};

/// Generation only: KPIs, comparison, insights, recommendations. No side effects.
#[derive(Clone)]
pub struct ReportPipeline {
    companies: Arc<dyn CompanyRepository>,
    kpi: KpiEngine,
    miners: Vec<Arc<dyn InsightMiner>>,
    ranker: InsightRanker,
    synthesizer: RecommendationSynthesizer,
    max_insights: usize,
}

impl ReportPipeline {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        kpi: KpiEngine,
        miners: Vec<Arc<dyn InsightMiner>>,
        ranker: InsightRanker,
        synthesizer: RecommendationSynthesizer,
        max_insights: usize,
    ) -> Self {
        Self {
            companies,
            kpi,
            miners,
            ranker,
            synthesizer,
            max_insights,
        }
    }

    /// Wires every repository role to one backend and registers the four standard miners.
    pub fn with_repositories<R>(
        repos: Arc<R>,
        report: &ReportSettings,
        synthesizer: RecommendationSynthesizer,
    ) -> Self
    where
        R: SalesRepository
            + CustomerRepository
            + StockRepository
            + ExpenseRepository
            + CompanyRepository
            + 'static,
    {
        let kpi = KpiEngine::new(repos.clone(), repos.clone(), repos.clone(), repos.clone());
        let miners: Vec<Arc<dyn InsightMiner>> = vec![
            Arc::new(StockAlertMiner::new(repos.clone(), report.stock_assumed_lost_sales)),
            Arc::new(ChurnRiskMiner::new(
                repos.clone(),
                report.churn_min_orders,
                report.churn_inactive_days,
            )),
            Arc::new(SeasonalityMiner::new(repos.clone(), report.seasonality_threshold_pct)),
            Arc::new(ProfitMarginMiner::new(repos.clone(), repos.clone())),
        ];
        Self::new(
            repos,
            kpi,
            miners,
            InsightRanker::new(RankingWeights::from_settings(report)),
            synthesizer,
            report.max_insights,
        )
    }

    pub async fn active_targets(&self, frequency: ReportFrequency) -> anyhow::Result<Vec<ReportTarget>> {
        self.companies.active_report_targets(frequency).await
    }

    pub async fn generate(
        &self,
        company_id: &str,
        frequency: ReportFrequency,
        as_of: NaiveDate,
    ) -> Result<Report, ReportError> {
        let company = self
            .companies
            .company(company_id)
            .await
            .map_err(|e| ReportError::data(company_id, e.context("company lookup failed")))?
            .ok_or_else(|| ReportError::CompanyNotFound(company_id.to_string()))?;

        let window = period::resolve(frequency, as_of);
        tracing::info!(
            company_id,
            frequency = frequency.as_str(),
            start = %window.start,
            end = %window.end,
            "generating report"
        );

        let current = self
            .kpi
            .calculate(company_id, &window)
            .await
            .map_err(|e| ReportError::data(company_id, e))?;
        let previous = self
            .kpi
            .calculate(company_id, &window.previous())
            .await
            .map_err(|e| ReportError::data(company_id, e.context("previous period")))?;
        let comparison = compare_snapshots(&current, &previous);

        let context = PeriodContext::from(&current);
        let mined = mine_all(&self.miners, company_id, &window, Some(&context)).await;
        let insights = self.ranker.select_top(mined, self.max_insights);

        let selected: Vec<Insight> = insights.iter().map(|s| s.insight.clone()).collect();
        let period_range = window.range_label();
        let recommendation = self
            .synthesizer
            .synthesize(&PromptInput {
                company_name: &company.name,
                period_label: frequency.label(),
                period_range: &period_range,
                kpis: &current,
                comparison: &comparison,
                insights: &selected,
            })
            .await;

        tracing::info!(
            company_id,
            insights = insights.len(),
            recommendation_source = ?recommendation.source,
            "report generated"
        );

        Ok(Report {
            company_id: company.id,
            company_name: company.name,
            currency: company
                .currency_code
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            frequency,
            period_label: frequency.label().to_string(),
            period_range,
            window,
            kpis: current,
            comparison,
            insights,
            recommendations: recommendation.text,
            recommendation_source: recommendation.source,
            generated_at: Utc::now(),
        })
    }
}
