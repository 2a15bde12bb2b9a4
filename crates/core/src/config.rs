use anyhow::Context;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_GEMINI_MAX_TOKENS: u32 = 300;
const DEFAULT_GEMINI_TEMPERATURE: f32 = 0.7;
const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_INSIGHTS: usize = 3;
/// Upper bound for store TTLs read from the environment (30 days).
const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub sentry_dsn: Option<String>,

    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub gemini_model: String,
    pub gemini_max_tokens: u32,
    pub gemini_temperature: f32,
    pub gemini_timeout_secs: u64,
    pub enable_llm_recommendations: bool,

    pub telegram_bot_token: Option<String>,
    pub telegram_base_url: Option<String>,

    pub report: ReportSettings,
    pub rate_limit: RateLimitSettings,
}

/// Tunables for the generation pipeline.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub max_insights: usize,
    pub churn_inactive_days: i64,
    pub churn_min_orders: i64,
    pub seasonality_threshold_pct: f64,
    pub stock_assumed_lost_sales: f64,
    pub weight_priority: f64,
    pub weight_impact: f64,
    pub weight_actionable: f64,
    pub batch_concurrency: usize,
    pub idempotency_ttl_secs: u64,
    pub tz_offset_hours: i32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_insights: DEFAULT_MAX_INSIGHTS,
            churn_inactive_days: 45,
            churn_min_orders: 3,
            seasonality_threshold_pct: 20.0,
            stock_assumed_lost_sales: 5.0,
            weight_priority: 40.0,
            weight_impact: 30.0,
            weight_actionable: 30.0,
            batch_concurrency: 5,
            idempotency_ttl_secs: 3600,
            tz_offset_hours: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub per_minute: u32,
    pub per_hour: u32,
    pub block_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            block_secs: 300,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = ReportSettings::default();
        let report = ReportSettings {
            max_insights: env_parse("MAX_INSIGHTS_PER_REPORT").unwrap_or(defaults.max_insights),
            churn_inactive_days: env_parse("CHURN_INACTIVE_DAYS")
                .unwrap_or(defaults.churn_inactive_days),
            churn_min_orders: env_parse("CHURN_MIN_ORDERS").unwrap_or(defaults.churn_min_orders),
            seasonality_threshold_pct: env_parse("SEASONALITY_THRESHOLD_PCT")
                .unwrap_or(defaults.seasonality_threshold_pct),
            stock_assumed_lost_sales: env_parse("STOCK_ASSUMED_LOST_SALES")
                .unwrap_or(defaults.stock_assumed_lost_sales),
            weight_priority: env_parse("INSIGHT_WEIGHT_PRIORITY")
                .unwrap_or(defaults.weight_priority),
            weight_impact: env_parse("INSIGHT_WEIGHT_IMPACT").unwrap_or(defaults.weight_impact),
            weight_actionable: env_parse("INSIGHT_WEIGHT_ACTIONABLE")
                .unwrap_or(defaults.weight_actionable),
            batch_concurrency: env_parse("REPORT_BATCH_CONCURRENCY")
                .unwrap_or(defaults.batch_concurrency),
            idempotency_ttl_secs: env_parse("REPORT_IDEMPOTENCY_TTL_SECS")
                .unwrap_or(defaults.idempotency_ttl_secs),
            tz_offset_hours: env_parse("REPORT_TZ_OFFSET_HOURS")
                .unwrap_or(defaults.tz_offset_hours),
        };

        let rl_defaults = RateLimitSettings::default();
        let rate_limit = RateLimitSettings {
            per_minute: env_parse("RATE_LIMIT_PER_MINUTE").unwrap_or(rl_defaults.per_minute),
            per_hour: env_parse("RATE_LIMIT_PER_HOUR").unwrap_or(rl_defaults.per_hour),
            block_secs: env_parse("RATE_LIMIT_BLOCK_SECS").unwrap_or(rl_defaults.block_secs),
        };

        let settings = Self {
            database_url: env_opt("DATABASE_URL"),
            redis_url: env_opt("REDIS_URL"),
            sentry_dsn: env_opt("SENTRY_DSN"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_base_url: env_opt("GEMINI_BASE_URL"),
            gemini_model: env_opt("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_max_tokens: env_parse("GEMINI_MAX_TOKENS").unwrap_or(DEFAULT_GEMINI_MAX_TOKENS),
            gemini_temperature: env_parse("GEMINI_TEMPERATURE")
                .unwrap_or(DEFAULT_GEMINI_TEMPERATURE),
            gemini_timeout_secs: env_parse("GEMINI_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_GEMINI_TIMEOUT_SECS),
            enable_llm_recommendations: env_parse("ENABLE_LLM_RECOMMENDATIONS").unwrap_or(true),
            telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            telegram_base_url: env_opt("TELEGRAM_BASE_URL"),
            report,
            rate_limit,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.gemini_temperature),
            "GEMINI_TEMPERATURE must be between 0 and 1 (got {})",
            self.gemini_temperature
        );
        anyhow::ensure!(
            (1..=10).contains(&self.report.max_insights),
            "MAX_INSIGHTS_PER_REPORT must be 1..=10 (got {})",
            self.report.max_insights
        );
        anyhow::ensure!(
            self.report.batch_concurrency >= 1,
            "REPORT_BATCH_CONCURRENCY must be >= 1"
        );
        anyhow::ensure!(
            (1..=MAX_TTL_SECS).contains(&self.report.idempotency_ttl_secs),
            "REPORT_IDEMPOTENCY_TTL_SECS must be 1..={MAX_TTL_SECS} (got {})",
            self.report.idempotency_ttl_secs
        );
        anyhow::ensure!(
            (1..=MAX_TTL_SECS).contains(&self.rate_limit.block_secs),
            "RATE_LIMIT_BLOCK_SECS must be 1..={MAX_TTL_SECS} (got {})",
            self.rate_limit.block_secs
        );
        anyhow::ensure!(
            self.report.weight_priority + self.report.weight_impact + self.report.weight_actionable
                > 0.0,
            "insight weights must not all be zero"
        );
        Ok(())
    }

    /// LLM path is used only when enabled and a key is present.
    pub fn llm_enabled(&self) -> bool {
        self.enable_llm_recommendations && self.gemini_api_key.is_some()
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is required")
    }

    pub fn require_redis_url(&self) -> anyhow::Result<&str> {
        self.redis_url.as_deref().context("REDIS_URL is required")
    }

    pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
        self.gemini_api_key
            .as_deref()
            .context("GEMINI_API_KEY is required")
    }

    pub fn require_telegram_bot_token(&self) -> anyhow::Result<&str> {
        self.telegram_bot_token
            .as_deref()
            .context("TELEGRAM_BOT_TOKEN is required")
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|s| s.parse::<T>().ok())
}
