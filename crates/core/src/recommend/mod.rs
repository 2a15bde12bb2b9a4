use crate::config::Settings;
use crate::domain::report::RecommendationSource;
use crate::llm::error::raw_output_excerpt;
use crate::llm::TextGenerator;
use crate::retry::RetryPolicy;
use std::sync::Arc;

pub mod fallback;
pub mod prompt;
pub mod sanitize;

pub use prompt::PromptInput;

/// Sanitized AI output at or below this many characters is rejected.
const MIN_ACCEPTED_LEN: usize = 20;

const RAW_OUTPUT_LOG_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub text: String,
    pub source: RecommendationSource,
}

/// Primary path through a [`TextGenerator`], deterministic bullets otherwise. Never fails.
#[derive(Clone)]
pub struct RecommendationSynthesizer {
    generator: Option<Arc<dyn TextGenerator>>,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl RecommendationSynthesizer {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        retry: RetryPolicy,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            generator,
            retry,
            max_tokens,
            temperature,
        }
    }

    /// `generator` is dropped when the settings disable the AI path.
    pub fn from_settings(settings: &Settings, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        let generator = generator.filter(|_| settings.llm_enabled());
        if generator.is_none() {
            tracing::warn!(
                enable_llm = settings.enable_llm_recommendations,
                has_api_key = settings.gemini_api_key.is_some(),
                "ai recommendations disabled; using rule-based fallback"
            );
        }
        Self::new(
            generator,
            RetryPolicy::default(),
            settings.gemini_max_tokens,
            settings.gemini_temperature,
        )
    }

    pub fn fallback_only() -> Self {
        Self::new(None, RetryPolicy::no_retry(), 0, 0.0)
    }

    pub async fn synthesize(&self, input: &PromptInput<'_>) -> Recommendation {
        if let Some(generator) = &self.generator {
            match self.try_generate(generator.as_ref(), input).await {
                Ok(Some(text)) => {
                    return Recommendation {
                        text,
                        source: RecommendationSource::Ai,
                    }
                }
                Ok(None) => {
                    tracing::warn!(
                        company = input.company_name,
                        provider = generator.provider_name(),
                        "ai output rejected after sanitizing; using fallback"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        company = input.company_name,
                        provider = generator.provider_name(),
                        error = %format!("{err:#}"),
                        raw_output = raw_output_excerpt(&err, RAW_OUTPUT_LOG_CHARS).as_deref(),
                        "ai recommendation failed; using fallback"
                    );
                }
            }
        }

        Recommendation {
            text: fallback::fallback_recommendations(input.kpis, input.comparison),
            source: RecommendationSource::Fallback,
        }
    }

    async fn try_generate(
        &self,
        generator: &dyn TextGenerator,
        input: &PromptInput<'_>,
    ) -> anyhow::Result<Option<String>> {
        let prompt = prompt::build(input);
        let raw = self
            .retry
            .run("recommendations", |_| {
                generator.generate(&prompt, self.max_tokens, self.temperature)
            })
            .await?;

        let text = sanitize::sanitize(&raw);
        Ok((text.chars().count() > MIN_ACCEPTED_LEN).then_some(text))
    }
}
