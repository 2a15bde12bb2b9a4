use crate::domain::insight::ScoredInsight;
use crate::domain::kpi::{KpiComparison, KpiSnapshot};
use crate::time::period::PeriodWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    Weekly,
    Monthly,
    Quarterly,
}

impl ReportFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Period label shown in the report header.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Weekly => "Week",
            Self::Monthly => "Month",
            Self::Quarterly => "Quarter",
        }
    }
}

impl fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            other => anyhow::bail!("unknown report frequency {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Telegram,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Ai,
    Fallback,
}

/// Used when a company has no currency configured.
pub const DEFAULT_CURRENCY: &str = "XAF";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub company_id: String,
    pub company_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub frequency: ReportFrequency,
    pub period_label: String,
    pub period_range: String,
    pub window: PeriodWindow,
    pub kpis: KpiSnapshot,
    pub comparison: KpiComparison,
    pub insights: Vec<ScoredInsight>,
    pub recommendations: String,
    pub recommendation_source: RecommendationSource,
    pub generated_at: DateTime<Utc>,
}

/// One row of the audit trail, written after every attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub company_id: String,
    pub frequency: ReportFrequency,
    pub as_of_date: NaiveDate,
    pub status: ReportStatus,
    pub delivery_method: Option<DeliveryMethod>,
    pub recipient: Option<String>,
    pub delivered: bool,
    pub report: Option<serde_json::Value>,
    pub error: Option<String>,
    pub elapsed_ms: i64,
    pub created_at: DateTime<Utc>,
}
