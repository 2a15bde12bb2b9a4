use crate::domain::insight::Insight;
use crate::domain::kpi::{format_amount, KpiComparison, KpiSnapshot};

/// Insights at or above this priority are spelled out in the prompt.
pub const CRITICAL_PRIORITY: u8 = 4;

pub struct PromptInput<'a> {
    pub company_name: &'a str,
    pub period_label: &'a str,
    pub period_range: &'a str,
    pub kpis: &'a KpiSnapshot,
    pub comparison: &'a KpiComparison,
    pub insights: &'a [Insight],
}

pub fn build(input: &PromptInput<'_>) -> String {
    format!(
        "Analyse the data below for the business \"{company}\" and write 2-3 CONCRETE, ACTIONABLE \
recommendations as a list.\n\n\
Period: {label} ({range})\n\
Overall situation: {situation}\n\n\
Key figures:\n{kpis}\n\n\
Critical insights:\n{insights}\n\n\
STRICT rules:\n\
- 150 words maximum\n\
- Encouraging, professional tone\n\
- Actionable advice with concrete numbers\n\
- Address the most critical insights first\n\
- No preamble\n\
- One recommendation per line, each starting with \"-\"\n\
- Start directly with the recommendations",
        company = input.company_name,
        label = input.period_label,
        range = input.period_range,
        situation = situation(input.kpis, input.comparison),
        kpis = kpi_lines(input.kpis, input.comparison),
        insights = insight_lines(input.insights),
    )
}

fn variation(v: f64) -> String {
    if v > 0.0 {
        format!("up +{v:.1}%")
    } else if v < 0.0 {
        format!("down {v:.1}%")
    } else {
        "flat 0%".to_string()
    }
}

fn kpi_lines(k: &KpiSnapshot, c: &KpiComparison) -> String {
    let mut lines = vec![
        format!("- Revenue: {} ({})", format_amount(k.revenue), variation(c.revenue_variation_pct)),
        format!("- Orders: {} ({})", k.order_count, variation(c.order_variation_pct)),
        format!("- New customers: {}", k.new_customers),
        format!(
            "- Returning customers: {} ({:+} vs previous period)",
            k.returning_customers, c.returning_customers_delta
        ),
        format!("- Expenses: {} ({})", format_amount(k.expenses), variation(c.expense_variation_pct)),
        format!("- Net result: {}", format_amount(k.net_result)),
    ];
    if k.stock_alert_count > 0 {
        lines.push(format!("- Stock alerts: {}", k.stock_alert_count));
    }
    lines.join("\n")
}

fn insight_lines(insights: &[Insight]) -> String {
    let lines: Vec<String> = insights
        .iter()
        .filter(|i| i.priority >= CRITICAL_PRIORITY)
        .map(|i| match i.financial_impact {
            Some(v) if v > 0.0 => format!("- {} (impact: {})", i.description, format_amount(v)),
            _ => format!("- {}", i.description),
        })
        .collect();
    if lines.is_empty() {
        "- none".to_string()
    } else {
        lines.join("\n")
    }
}

fn situation(k: &KpiSnapshot, c: &KpiComparison) -> String {
    let profitability = if k.net_result < 0.0 {
        "loss-making"
    } else {
        match k.profit_margin_pct() {
            Some(m) if m > 30.0 => "highly profitable",
            Some(m) if m > 15.0 => "profitable",
            Some(_) => "marginally profitable",
            None => "no activity",
        }
    };
    let trend = match c.revenue_variation_pct {
        v if v > 20.0 => "growing fast",
        v if v > 5.0 => "growing",
        v if v < -20.0 => "declining sharply",
        v if v < -5.0 => "declining",
        _ => "stable",
    };
    format!("business {profitability}, {trend}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::insight::InsightType;

    #[test]
    fn embeds_only_critical_insights_and_variations() {
        let kpis = KpiSnapshot::from_parts(1_000_000.0, 40, 5, 3, 2, 1_050_000.0).unwrap();
        let comparison = KpiComparison {
            revenue_variation_pct: -25.0,
            order_variation_pct: 10.0,
            expense_variation_pct: 0.0,
            returning_customers_delta: -2,
        };
        let insights = vec![
            Insight::new(InsightType::ProfitMargin, "Loss", "Expenses exceed revenue.", 5)
                .unwrap()
                .with_financial_impact(Some(50_000.0)),
            Insight::new(InsightType::Seasonality, "Down", "Sales fell 25%.", 3).unwrap(),
        ];

        let p = build(&PromptInput {
            company_name: "Chez Mama",
            period_label: "Month",
            period_range: "01/07 - 31/07/2025",
            kpis: &kpis,
            comparison: &comparison,
            insights: &insights,
        });

        assert!(p.contains("\"Chez Mama\""));
        assert!(p.contains("Period: Month (01/07 - 31/07/2025)"));
        assert!(p.contains("- Revenue: 1,000,000 (down -25.0%)"));
        assert!(p.contains("- Orders: 40 (up +10.0%)"));
        assert!(p.contains("(-2 vs previous period)"));
        assert!(p.contains("- Stock alerts: 2"));
        assert!(p.contains("- Expenses exceed revenue. (impact: 50,000)"));
        assert!(!p.contains("Sales fell 25%"));
        assert!(p.contains("business loss-making, declining sharply"));
    }

    #[test]
    fn no_critical_insights_is_explicit() {
        assert_eq!(insight_lines(&[]), "- none");
    }
}
