//! Outbound report delivery. Success or failure is reported back to the caller and recorded,
//! never retried here.

use crate::domain::report::{DeliveryMethod, Report};

pub mod format;
pub mod telegram;

pub use format::render_report_text;
pub use telegram::TelegramNotifier;

#[async_trait::async_trait]
pub trait ReportNotifier: Send + Sync {
    fn channel(&self) -> DeliveryMethod;

    async fn send(&self, recipient: &str, report: &Report) -> anyhow::Result<()>;
}
