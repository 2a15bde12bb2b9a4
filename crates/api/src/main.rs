use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use bizpulse_core::app::{connect_store, AppHandles};
use bizpulse_core::config::Settings;
use bizpulse_core::domain::report::{Report, ReportFrequency};
use bizpulse_core::guard::{KeyValueStore, RateLimiter, RateLimits};
use bizpulse_core::pipeline::{ReportError, ReportJob, RunOutcome};
use bizpulse_core::storage::history::HistoryRow;
use bizpulse_core::time::period::resolve_as_of_date;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod rate_limit;

use rate_limit::RouteLimiter;

const DEFAULT_HISTORY_LIMIT: i64 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store = connect_store(&settings).await;
    let handles = connect_db(&settings)
        .await
        .map(|pool| AppHandles::from_parts(&settings, pool, store.clone()));

    let state = AppState {
        handles,
        store: store.clone(),
        tz_offset_hours: settings.report.tz_offset_hours,
    };
    let app = router(state, store, &settings);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn connect_db(settings: &Settings) -> Option<PgPool> {
    let db_url = match settings.require_database_url() {
        Ok(url) => url,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            return None;
        }
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return None;
        }
    };

    match bizpulse_core::storage::migrate(&pool).await {
        Ok(()) => Some(pool),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            None
        }
    }
}

fn router(state: AppState, store: Arc<dyn KeyValueStore>, settings: &Settings) -> Router {
    let standard = RateLimits::from_settings(&settings.rate_limit);
    let strict = RateLimits {
        block: standard.block,
        ..RateLimits::STRICT
    };

    let generate = Router::new()
        .route("/reports/preview", post(preview_report))
        .route("/reports/send", post(send_report))
        .route_layer(middleware::from_fn_with_state(
            RouteLimiter {
                limiter: RateLimiter::new(store.clone(), strict),
                endpoint: "reports_generate",
            },
            rate_limit::enforce,
        ));

    let history = Router::new()
        .route("/reports/history/:company_id", get(report_history))
        .route_layer(middleware::from_fn_with_state(
            RouteLimiter {
                limiter: RateLimiter::new(store, standard),
                endpoint: "reports_history",
            },
            rate_limit::enforce,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(generate)
        .merge(history)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "database": state.handles.is_some(),
        "store": state.store.provider_name(),
    }))
}

#[derive(Clone)]
struct AppState {
    handles: Option<AppHandles>,
    store: Arc<dyn KeyValueStore>,
    tz_offset_hours: i32,
}

impl AppState {
    fn handles(&self) -> Result<&AppHandles, StatusCode> {
        self.handles.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Debug, Deserialize)]
struct ReportRequest {
    company_id: String,
    frequency: ReportFrequency,
    #[serde(default)]
    as_of_date: Option<String>,
    #[serde(default)]
    recipient: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<Report>,
}

fn report_error_status(err: &ReportError) -> StatusCode {
    match err {
        ReportError::CompanyNotFound(_) => StatusCode::NOT_FOUND,
        ReportError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn capture_report_error(err: ReportError) -> StatusCode {
    let status = report_error_status(&err);
    if status.is_server_error() {
        let err = anyhow::Error::new(err);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "report request failed");
    }
    status
}

async fn preview_report(
    State(state): State<AppState>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<Report>, StatusCode> {
    let handles = state.handles()?;
    let as_of = resolve_as_of_date(req.as_of_date.as_deref(), chrono::Utc::now(), state.tz_offset_hours)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let report = handles
        .runner
        .pipeline()
        .generate(&req.company_id, req.frequency, as_of)
        .await
        .map_err(capture_report_error)?;
    Ok(Json(report))
}

async fn send_report(
    State(state): State<AppState>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<SendResponse>, StatusCode> {
    let handles = state.handles()?;
    let as_of = resolve_as_of_date(req.as_of_date.as_deref(), chrono::Utc::now(), state.tz_offset_hours)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let outcome = handles
        .runner
        .run(ReportJob {
            company_id: req.company_id,
            frequency: req.frequency,
            as_of,
            recipient: req.recipient,
            dry_run: false,
        })
        .await
        .map_err(capture_report_error)?;

    let status = outcome.as_str();
    Ok(Json(match outcome {
        RunOutcome::Skipped => SendResponse {
            status,
            error: None,
            report: None,
        },
        RunOutcome::Generated(report) | RunOutcome::Delivered(report) => SendResponse {
            status,
            error: None,
            report: Some(*report),
        },
        RunOutcome::DeliveryFailed { report, error } => SendResponse {
            status,
            error: Some(error),
            report: Some(*report),
        },
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn report_history(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRow>>, StatusCode> {
    let handles = state.handles()?;
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=100).contains(&limit) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let rows = handles
        .history
        .list_recent(&company_id, limit)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
