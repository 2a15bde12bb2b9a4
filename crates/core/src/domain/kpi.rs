use serde::{Deserialize, Serialize};

/// Aggregated metrics for one company over one period. Computed on demand, never stored alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub revenue: f64,
    pub order_count: i64,
    pub new_customers: i64,
    pub returning_customers: i64,
    pub stock_alert_count: i64,
    pub expenses: f64,
    pub net_result: f64,
}

impl KpiSnapshot {
    /// Builds a snapshot with `net_result = revenue - expenses`.
    pub fn from_parts(
        revenue: f64,
        order_count: i64,
        new_customers: i64,
        returning_customers: i64,
        stock_alert_count: i64,
        expenses: f64,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(revenue >= 0.0, "revenue must be >= 0 (got {revenue})");
        anyhow::ensure!(expenses >= 0.0, "expenses must be >= 0 (got {expenses})");
        anyhow::ensure!(
            order_count >= 0 && new_customers >= 0 && returning_customers >= 0 && stock_alert_count >= 0,
            "counts must be >= 0"
        );

        Ok(Self {
            revenue,
            order_count,
            new_customers,
            returning_customers,
            stock_alert_count,
            expenses,
            net_result: revenue - expenses,
        })
    }

    pub fn average_order_value(&self) -> f64 {
        if self.order_count == 0 {
            return 0.0;
        }
        self.revenue / self.order_count as f64
    }

    /// Returning customers over all active customers, in percent.
    pub fn retention_rate_pct(&self) -> f64 {
        let active = self.new_customers + self.returning_customers;
        if active == 0 {
            return 0.0;
        }
        self.returning_customers as f64 / active as f64 * 100.0
    }

    pub fn profit_margin_pct(&self) -> Option<f64> {
        if self.revenue == 0.0 {
            return None;
        }
        Some(self.net_result / self.revenue * 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiComparison {
    pub revenue_variation_pct: f64,
    pub order_variation_pct: f64,
    pub expense_variation_pct: f64,
    pub returning_customers_delta: i64,
}

impl KpiComparison {
    /// Metrics whose absolute variation reaches `threshold_pct`, in a fixed order.
    pub fn significant_changes(&self, threshold_pct: f64) -> Vec<(&'static str, f64)> {
        [
            ("revenue", self.revenue_variation_pct),
            ("orders", self.order_variation_pct),
            ("expenses", self.expense_variation_pct),
        ]
        .into_iter()
        .filter(|(_, v)| v.abs() >= threshold_pct)
        .collect()
    }
}

/// Whole-unit amount with thousands separators, e.g. `-1,050,000`.
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}
