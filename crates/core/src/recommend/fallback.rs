use crate::domain::kpi::{KpiComparison, KpiSnapshot};

const MAX_BULLETS: usize = 3;
const REVENUE_DROP_PCT: f64 = -10.0;

/// Deterministic rule ladder. Always returns between one and three bullet lines.
pub fn fallback_recommendations(kpis: &KpiSnapshot, comparison: &KpiComparison) -> String {
    let mut bullets = Vec::with_capacity(MAX_BULLETS);

    if kpis.net_result < 0.0 {
        bullets.push("- Cut expenses by 15 to 20% right away, starting with the most expensive suppliers.");
    }
    if comparison.revenue_variation_pct < REVENUE_DROP_PCT {
        bullets.push("- Run a promotion for existing customers this week to offset the drop in sales.");
    }
    if kpis.returning_customers < kpis.new_customers {
        bullets.push("- Introduce a loyalty offer (e.g. 10% off the third purchase) to bring customers back.");
    }
    if bullets.is_empty() {
        bullets.push("- Keep up the current effort and review your key figures every week.");
    }

    bullets.truncate(MAX_BULLETS);
    bullets.join("\n")
}
