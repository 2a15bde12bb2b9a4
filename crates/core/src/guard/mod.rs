pub mod fingerprint;
pub mod idempotency;
pub mod rate_limit;
pub mod store;

pub use idempotency::{idempotency_key, IdempotencyManager};
pub use rate_limit::{RateDecision, RateLimiter, RateLimits, RejectReason};
pub use store::{KeyValueStore, MemoryStore, RedisStore, StoreError};
