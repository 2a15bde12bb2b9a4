use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    StockAlert,
    ChurnRisk,
    Seasonality,
    ProfitMargin,
    ExpenseAnomaly,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StockAlert => "stock_alert",
            Self::ChurnRisk => "churn_risk",
            Self::Seasonality => "seasonality",
            Self::ProfitMargin => "profit_margin",
            Self::ExpenseAnomaly => "expense_anomaly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightType,
    pub title: String,
    pub description: String,
    /// 1 (informational) ..= 5 (critical).
    pub priority: u8,
    pub financial_impact: Option<f64>,
    pub actionable: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Insight {
    pub fn new(
        kind: InsightType,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u8,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (1..=5).contains(&priority),
            "insight priority must be 1..=5 (got {priority})"
        );
        Ok(Self {
            kind,
            title: title.into(),
            description: description.into(),
            priority,
            financial_impact: None,
            actionable: true,
            metadata: Map::new(),
        })
    }

    pub fn with_financial_impact(mut self, impact: Option<f64>) -> Self {
        self.financial_impact = impact;
        self
    }

    pub fn with_actionable(mut self, actionable: bool) -> Self {
        self.actionable = actionable;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Insight plus its composite ranking score in `[0, 100]`. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInsight {
    #[serde(flatten)]
    pub insight: Insight,
    pub score: f64,
}
