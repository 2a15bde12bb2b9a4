use crate::llm::Provider;
use std::fmt;

/// Upstream failure with enough context to diagnose it from the logs alone.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "text generation failed (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

/// Upstream body carried by an [`LlmDiagnosticsError`] anywhere in `err`'s chain,
/// cut to `max_chars`.
pub fn raw_output_excerpt(err: &anyhow::Error, max_chars: usize) -> Option<String> {
    let diag = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<LlmDiagnosticsError>())?;
    let raw = diag.raw_output.as_deref()?;
    let mut excerpt: String = raw.chars().take(max_chars).collect();
    if raw.chars().count() > max_chars {
        excerpt.push_str("...");
    }
    Some(excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(body: &str) -> anyhow::Error {
        anyhow::Error::new(LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage: "http",
            detail: "status=400 Bad Request".to_string(),
            raw_output: Some(body.to_string()),
        })
    }

    #[test]
    fn excerpt_reads_upstream_body() {
        let err = http_error(r#"{"error":{"message":"API key not valid"}}"#);
        let got = raw_output_excerpt(&err, 500).unwrap();
        assert!(got.contains("API key not valid"), "{got}");
        assert!(!format!("{err:#}").contains("API key not valid"));
    }

    #[test]
    fn excerpt_survives_context_and_truncates() {
        let err = http_error(&"x".repeat(50)).context("recommendations");
        assert_eq!(raw_output_excerpt(&err, 10).unwrap(), format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn excerpt_absent_for_other_errors() {
        assert_eq!(raw_output_excerpt(&anyhow::anyhow!("timeout"), 10), None);
    }
}
