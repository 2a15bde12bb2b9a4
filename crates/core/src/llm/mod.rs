pub mod error;
pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

/// Free-text generation. Implementations make exactly one upstream call per invocation;
/// retrying is the caller's concern.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32)
        -> anyhow::Result<String>;
}
