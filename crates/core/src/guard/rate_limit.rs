use crate::config::RateLimitSettings;
use crate::guard::store::{KeyValueStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub block: Duration,
}

impl RateLimits {
    pub const STANDARD: Self = Self::new(60, 1000);
    /// Expensive endpoints (generation, preview).
    pub const STRICT: Self = Self::new(10, 100);
    pub const PERMISSIVE: Self = Self::new(120, 2000);

    const fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            per_minute,
            per_hour,
            block: Duration::from_secs(300),
        }
    }

    pub fn from_settings(s: &RateLimitSettings) -> Self {
        Self {
            per_minute: s.per_minute,
            per_hour: s.per_hour,
            block: Duration::from_secs(s.block_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blocked,
    MinuteLimit,
    HourLimit,
}

impl RejectReason {
    pub fn message(&self, limits: &RateLimits) -> String {
        match self {
            Self::Blocked => format!(
                "Rate limit exceeded. Blocked for {}s, please try again later.",
                limits.block.as_secs()
            ),
            Self::MinuteLimit => format!(
                "Rate limit exceeded: {} requests per minute. Blocked for {}s.",
                limits.per_minute,
                limits.block.as_secs()
            ),
            Self::HourLimit => format!(
                "Hourly rate limit exceeded: {} requests per hour.",
                limits.per_hour
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Rejected {
        reason: RejectReason,
        retry_after: Duration,
    },
}

/// Fixed minute/hour counters per client and endpoint, plus a cool-down block shared across
/// endpoints.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, limits: RateLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Store failures allow the request.
    pub async fn check(&self, client: &str, endpoint: &str) -> RateDecision {
        match self.try_check(client, endpoint).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(client, endpoint, error = %err, "rate limit check failed; allowing");
                RateDecision::Allowed
            }
        }
    }

    async fn try_check(&self, client: &str, endpoint: &str) -> StoreResult<RateDecision> {
        let block_key = format!("ratelimit:block:{client}");
        let minute_key = format!("ratelimit:{endpoint}:minute:{client}");
        let hour_key = format!("ratelimit:{endpoint}:hour:{client}");

        if self.store.get(&block_key).await?.is_some() {
            tracing::warn!(client, endpoint, "blocked client attempted access");
            return Ok(RateDecision::Rejected {
                reason: RejectReason::Blocked,
                retry_after: self.limits.block,
            });
        }

        let minute_count = self.store.incr(&minute_key).await?;
        let hour_count = self.store.incr(&hour_key).await?;
        if minute_count == 1 {
            self.store.expire(&minute_key, MINUTE).await?;
        }
        if hour_count == 1 {
            self.store.expire(&hour_key, HOUR).await?;
        }

        let per_minute = i64::from(self.limits.per_minute);
        if minute_count > per_minute {
            self.store
                .set_ex(&block_key, "blocked", self.limits.block)
                .await?;
            tracing::warn!(client, endpoint, minute_count, limit = per_minute, "rate limit exceeded; client blocked");
            return Ok(RateDecision::Rejected {
                reason: RejectReason::MinuteLimit,
                retry_after: self.limits.block,
            });
        }

        if hour_count > i64::from(self.limits.per_hour) {
            tracing::warn!(client, endpoint, hour_count, limit = self.limits.per_hour, "hourly rate limit exceeded");
            return Ok(RateDecision::Rejected {
                reason: RejectReason::HourLimit,
                retry_after: HOUR,
            });
        }

        if minute_count * 5 > per_minute * 4 {
            tracing::info!(client, endpoint, minute_count, limit = per_minute, "client approaching rate limit");
        }
        Ok(RateDecision::Allowed)
    }
}
