//! Process-scoped handles, built once at startup and shared by reference.

use crate::config::Settings;
use crate::delivery::{ReportNotifier, TelegramNotifier};
use crate::guard::{IdempotencyManager, KeyValueStore, MemoryStore, RedisStore};
use crate::llm::{GeminiClient, TextGenerator};
use crate::pipeline::{ReportPipeline, ReportRunner};
use crate::recommend::RecommendationSynthesizer;
use crate::storage::history::PgHistorySink;
use crate::storage::postgres::PgRepositories;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppHandles {
    pub pool: sqlx::PgPool,
    pub store: Arc<dyn KeyValueStore>,
    pub history: Arc<PgHistorySink>,
    pub runner: ReportRunner,
}

impl AppHandles {
    /// Postgres is required; Redis, Gemini and Telegram each degrade on their own.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        crate::storage::migrate(&pool).await?;

        let store = connect_store(settings).await;
        Ok(Self::from_parts(settings, pool, store))
    }

    pub fn from_parts(settings: &Settings, pool: sqlx::PgPool, store: Arc<dyn KeyValueStore>) -> Self {
        let repos = Arc::new(PgRepositories::new(pool.clone()));
        let history = Arc::new(PgHistorySink::new(pool.clone()));

        let synthesizer = RecommendationSynthesizer::from_settings(settings, text_generator(settings));
        let pipeline = ReportPipeline::with_repositories(repos, &settings.report, synthesizer);

        let runner = ReportRunner::new(
            Arc::new(pipeline),
            IdempotencyManager::new(store.clone()),
            notifier(settings),
            Some(history.clone()),
            Duration::from_secs(settings.report.idempotency_ttl_secs),
            settings.report.batch_concurrency,
        );

        Self {
            pool,
            store,
            history,
            runner,
        }
    }
}

/// Redis when configured and reachable, otherwise a process-local store.
pub async fn connect_store(settings: &Settings) -> Arc<dyn KeyValueStore> {
    let Some(url) = settings.redis_url.as_deref() else {
        tracing::warn!("REDIS_URL missing; using in-memory store (dedup and rate limits are per-process)");
        return Arc::new(MemoryStore::new());
    };
    match RedisStore::connect(url).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "redis connect failed; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

fn text_generator(settings: &Settings) -> Option<Arc<dyn TextGenerator>> {
    if !settings.llm_enabled() {
        return None;
    }
    match GeminiClient::from_settings(settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "gemini client init failed");
            None
        }
    }
}

fn notifier(settings: &Settings) -> Option<Arc<dyn ReportNotifier>> {
    settings.telegram_bot_token.as_ref()?;
    match TelegramNotifier::from_settings(settings) {
        Ok(n) => Some(Arc::new(n)),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "telegram notifier init failed");
            None
        }
    }
}
