use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{SlideInput, Translation, TranslationMethod};
use crate::cancel::CancelToken;
use crate::chain::{FallbackChain, Strategy};
use crate::document::StructuredDocument;
use crate::error::{ProviderError, StageError};
use crate::ocr::{OcrEngine, recognize, reflow_translation};
use crate::pool::WorkerPool;
use crate::prompts::LanguagePair;
use crate::providers::{EngineCache, OpenRouter, Usage, translate_lines};

pub const NO_KEY_NOTE: &str = "No API key configured";
const STAGE_NAME: &str = "ocr";

#[derive(Debug, Clone, PartialEq)]
pub struct TextTranslation {
    pub text: String,
    pub method: TranslationMethod,
    pub model_name: String,
    pub usage: Usage,
}

pub struct TextInput {
    pub text: String,
    pub cancel: CancelToken,
}

struct Passthrough;

#[async_trait]
impl Strategy<TextInput, TextTranslation> for Passthrough {
    fn name(&self) -> &str {
        TranslationMethod::Passthrough.as_str()
    }

    async fn attempt(&self, input: &TextInput) -> Result<TextTranslation, StageError> {
        Ok(TextTranslation {
            text: input.text.clone(),
            method: TranslationMethod::Passthrough,
            model_name: TranslationMethod::Passthrough.as_str().to_string(),
            usage: Usage::default(),
        })
    }
}

struct TextLlm {
    client: OpenRouter,
    system_prompt: String,
    pool: WorkerPool,
}

#[async_trait]
impl Strategy<TextInput, TextTranslation> for TextLlm {
    fn name(&self) -> &str {
        TranslationMethod::OpenRouter.as_str()
    }

    async fn attempt(&self, input: &TextInput) -> Result<TextTranslation, StageError> {
        let client = self.client.clone();
        let system = self.system_prompt.clone();
        let text = input.text.clone();
        let reply = self
            .pool
            .run(async move { client.chat(&system, &text).await })
            .await??;
        input.cancel.checkpoint()?;
        let text = reflow_translation(&reply.text);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.client.provider_name().to_string(),
            }
            .into());
        }
        info!("text LLM translation ok: {} chars", text.chars().count());
        Ok(TextTranslation {
            text,
            method: TranslationMethod::OpenRouter,
            model_name: reply.model,
            usage: reply.usage,
        })
    }
}

struct Offline {
    cache: Arc<EngineCache>,
    pair: LanguagePair,
    pool: WorkerPool,
}

#[async_trait]
impl Strategy<TextInput, TextTranslation> for Offline {
    fn name(&self) -> &str {
        TranslationMethod::Offline.as_str()
    }

    async fn attempt(&self, input: &TextInput) -> Result<TextTranslation, StageError> {
        let cache = self.cache.clone();
        let pair = self.pair.clone();
        let text = input.text.clone();
        let (text, model_name) = self
            .pool
            .run_blocking(move || {
                let engine = cache.get(&pair)?;
                let translated = translate_lines(engine.as_ref(), &text)?;
                Ok::<_, ProviderError>((translated, engine.model_name()))
            })
            .await??;
        input.cancel.checkpoint()?;
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: model_name,
            }
            .into());
        }
        info!("offline translation ok: {} chars", text.chars().count());
        Ok(TextTranslation {
            text,
            method: TranslationMethod::Offline,
            model_name,
            usage: Usage::default(),
        })
    }
}

pub struct OcrChainStrategy {
    engine: Arc<dyn OcrEngine>,
    offline: Arc<EngineCache>,
    pool: WorkerPool,
    pair: LanguagePair,
    min_width: u32,
    text_llm: Option<TextLlm>,
}

impl OcrChainStrategy {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        offline: Arc<EngineCache>,
        pool: WorkerPool,
        pair: LanguagePair,
        min_width: u32,
    ) -> Self {
        Self {
            engine,
            offline,
            pool,
            pair,
            min_width,
            text_llm: None,
        }
    }

    // Without a key the text LLM stage is left out entirely.
    pub fn with_text_llm(mut self, client: OpenRouter, system_prompt: String) -> Self {
        self.text_llm = client.has_key().then(|| TextLlm {
            client,
            system_prompt,
            pool: self.pool.clone(),
        });
        self
    }

    fn stages(&self) -> FallbackChain<TextInput, TextTranslation> {
        let mut chain = FallbackChain::new(STAGE_NAME);
        if self.pair.is_identity() {
            chain.push(Passthrough);
            return chain;
        }
        if let Some(llm) = &self.text_llm {
            chain.push(TextLlm {
                client: llm.client.clone(),
                system_prompt: llm.system_prompt.clone(),
                pool: llm.pool.clone(),
            });
        }
        chain.push(Offline {
            cache: self.offline.clone(),
            pair: self.pair.clone(),
            pool: self.pool.clone(),
        });
        chain
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages()
            .stage_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Strategy<SlideInput, Translation> for OcrChainStrategy {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn attempt(&self, input: &SlideInput) -> Result<Translation, StageError> {
        input.cancel.checkpoint()?;
        let engine = self.engine.clone();
        let image = input.image.clone();
        let hint = self.pair.source.clone();
        let min_width = self.min_width;
        let text = self
            .pool
            .run_blocking(move || recognize(engine.as_ref(), &image, &hint, min_width))
            .await??;
        debug!(
            "slide {}: OCR extracted {} chars",
            input.slide_number,
            text.chars().count()
        );

        let stages = self.stages();
        let outcome = stages
            .run(
                &TextInput {
                    text,
                    cancel: input.cancel.clone(),
                },
                &input.cancel,
            )
            .await?;

        let mut fallback_errors = Vec::new();
        if self.text_llm.is_none() && !self.pair.is_identity() {
            fallback_errors.push(NO_KEY_NOTE.to_string());
        }
        fallback_errors.extend(
            outcome
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.stage, failure.error)),
        );

        let translated = outcome.value;
        let document = StructuredDocument::from_plain_text(&translated.text);
        if document.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: translated.model_name,
            }
            .into());
        }
        Ok(Translation {
            document,
            usage: translated.usage,
            method: translated.method,
            model_name: translated.model_name,
            fallback_errors,
        })
    }
}
