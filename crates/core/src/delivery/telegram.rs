use crate::config::Settings;
use crate::delivery::format::{render_report_text, split_message, MESSAGE_LIMIT};
use crate::delivery::ReportNotifier;
use crate::domain::report::{DeliveryMethod, Report};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let bot_token = settings.require_telegram_bot_token()?.to_string();
        let base_url = settings
            .telegram_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            bot_token,
            base_url,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        )
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<i64> {
        let res = self
            .http
            .post(self.url())
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .context("telegram sendMessage request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read telegram response")?;
        if !status.is_success() {
            anyhow::bail!("telegram sendMessage HTTP {status}: {body}");
        }

        let parsed: ApiResponse =
            serde_json::from_str(&body).context("failed to parse telegram response")?;
        if !parsed.ok {
            anyhow::bail!(
                "telegram rejected message: {}",
                parsed.description.as_deref().unwrap_or("no description")
            );
        }
        Ok(parsed.result.map(|m| m.message_id).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ReportNotifier for TelegramNotifier {
    fn channel(&self) -> DeliveryMethod {
        DeliveryMethod::Telegram
    }

    async fn send(&self, recipient: &str, report: &Report) -> anyhow::Result<()> {
        let text = render_report_text(report);
        let chunks = split_message(&text, MESSAGE_LIMIT);
        tracing::info!(
            company_id = %report.company_id,
            chat_id = recipient,
            message_len = text.chars().count(),
            parts = chunks.len(),
            "sending telegram report"
        );

        for (i, chunk) in chunks.iter().enumerate() {
            let message_id = self
                .send_text(recipient, chunk)
                .await
                .with_context(|| format!("part {}/{}", i + 1, chunks.len()))?;
            tracing::debug!(chat_id = recipient, message_id, part = i + 1, "telegram message sent");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_token_and_trims_base() {
        let n = TelegramNotifier {
            http: reqwest::Client::new(),
            bot_token: "123:abc".into(),
            base_url: "http://localhost:8081/".into(),
        };
        assert_eq!(n.url(), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn parses_error_response() {
        let r: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
                .unwrap();
        assert!(!r.ok);
        assert_eq!(r.description.as_deref(), Some("Bad Request: chat not found"));
        assert!(r.result.is_none());
    }
}
