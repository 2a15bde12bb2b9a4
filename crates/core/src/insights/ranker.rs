use crate::config::ReportSettings;
use crate::domain::insight::{Insight, ScoredInsight};

const IMPACT_CAP: f64 = 1_000_000.0;
pub const MAX_SELECTABLE: usize = 10;

/// Weights are renormalised so they always sum to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub priority: f64,
    pub impact: f64,
    pub actionable: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            priority: 40.0,
            impact: 30.0,
            actionable: 30.0,
        }
    }
}

impl RankingWeights {
    pub fn from_settings(report: &ReportSettings) -> Self {
        Self {
            priority: report.weight_priority,
            impact: report.weight_impact,
            actionable: report.weight_actionable,
        }
    }

    fn normalized(self) -> Self {
        let total = self.priority + self.impact + self.actionable;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            priority: self.priority / total * 100.0,
            impact: self.impact / total * 100.0,
            actionable: self.actionable / total * 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsightRanker {
    weights: RankingWeights,
}

impl Default for InsightRanker {
    fn default() -> Self {
        Self::new(RankingWeights::default())
    }
}

impl InsightRanker {
    pub fn new(weights: RankingWeights) -> Self {
        Self {
            weights: weights.normalized(),
        }
    }

    pub fn score(&self, insight: &Insight) -> f64 {
        let priority = f64::from(insight.priority) / 5.0 * self.weights.priority;
        let impact = insight
            .financial_impact
            .filter(|v| *v > 0.0)
            .map(|v| (v / IMPACT_CAP).min(1.0) * self.weights.impact)
            .unwrap_or(0.0);
        let actionable = if insight.actionable {
            self.weights.actionable
        } else {
            0.0
        };
        priority + impact + actionable
    }

    /// Highest scores first, at most `max_count` (clamped to 1..=10). Equal scores keep
    /// their input order.
    pub fn select_top(&self, insights: Vec<Insight>, max_count: usize) -> Vec<ScoredInsight> {
        let total = insights.len();
        let max_count = max_count.clamp(1, MAX_SELECTABLE);

        let mut scored: Vec<ScoredInsight> = insights
            .into_iter()
            .map(|insight| ScoredInsight {
                score: self.score(&insight),
                insight,
            })
            .collect();
        // Stable.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(max_count);

        tracing::debug!(
            total,
            selected = scored.len(),
            top_scores = ?scored.iter().map(|s| s.score).collect::<Vec<_>>(),
            "insights ranked"
        );
        scored
    }

    pub fn filter_by_priority(insights: &[Insight], min_priority: u8) -> Vec<Insight> {
        insights
            .iter()
            .filter(|i| i.priority >= min_priority)
            .cloned()
            .collect()
    }

    pub fn filter_by_financial_impact(insights: &[Insight], min_impact: f64) -> Vec<Insight> {
        insights
            .iter()
            .filter(|i| i.financial_impact.is_some_and(|v| v >= min_impact))
            .cloned()
            .collect()
    }
}
