use anyhow::Context;
use bizpulse_core::app::AppHandles;
use bizpulse_core::config::Settings;
use bizpulse_core::domain::report::ReportFrequency;
use bizpulse_core::pipeline::{ReportJob, RunOutcome};
use bizpulse_core::time::period::resolve_as_of_date;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bridge;

use bridge::TaskBridge;

#[derive(Debug, Parser)]
#[command(name = "bizpulse_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate (and optionally deliver) one company's report.
    Generate {
        #[arg(long)]
        company_id: String,

        /// weekly, monthly or quarterly.
        #[arg(long)]
        frequency: ReportFrequency,

        /// Last day of the period (YYYY-MM-DD). Defaults to today in the business timezone.
        #[arg(long)]
        as_of_date: Option<String>,

        /// Telegram chat id. Without one the report is generated and recorded only.
        #[arg(long)]
        recipient: Option<String>,

        /// Print the report; skip dedup, delivery and history.
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate and deliver every scheduled report for a frequency.
    Batch {
        #[arg(long)]
        frequency: ReportFrequency,

        #[arg(long)]
        as_of_date: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let bridge = TaskBridge::new()?;

    let result = bridge.run(execute(settings, args.command));
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker task failed");
    }
    result
}

async fn execute(settings: Settings, command: Command) -> anyhow::Result<()> {
    let handles = AppHandles::connect(&settings).await?;
    let tz = settings.report.tz_offset_hours;

    match command {
        Command::Generate {
            company_id,
            frequency,
            as_of_date,
            recipient,
            dry_run,
        } => {
            let as_of = resolve_as_of_date(as_of_date.as_deref(), chrono::Utc::now(), tz)?;
            let outcome = handles
                .runner
                .run(ReportJob {
                    company_id: company_id.clone(),
                    frequency,
                    as_of,
                    recipient,
                    dry_run,
                })
                .await
                .with_context(|| format!("report for {company_id} failed"))?;

            tracing::info!(%company_id, %as_of, status = outcome.as_str(), "report task finished");
            let mut out = json!({ "status": outcome.as_str(), "company_id": company_id });
            if let RunOutcome::DeliveryFailed { error, .. } = &outcome {
                out["error"] = json!(error);
            }
            if dry_run {
                out["report"] = serde_json::to_value(outcome.report())?;
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Batch {
            frequency,
            as_of_date,
        } => {
            let as_of = resolve_as_of_date(as_of_date.as_deref(), chrono::Utc::now(), tz)?;
            let summary = handles.runner.run_batch(frequency, as_of).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "frequency": frequency,
                    "as_of_date": as_of,
                    "summary": summary,
                }))?
            );
        }
    }
    Ok(())
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
