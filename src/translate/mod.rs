mod ocr_chain;
mod vision;

use anyhow::{Result, anyhow};
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::chain::FallbackChain;
use crate::document::StructuredDocument;
use crate::error::StageError;
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::pool::WorkerPool;
use crate::prompts::{
    LanguagePair, render_compact_vision_prompt, render_text_system_prompt, render_vision_prompt,
};
use crate::providers::{
    Claude, CommandEngineFactory, EngineCache, HttpTransport, OpenRouter, ReqwestTransport,
    RetryPolicy, Usage,
};
use crate::settings::Settings;

pub use ocr_chain::{NO_KEY_NOTE, OcrChainStrategy, TextTranslation};
pub use vision::{VisionBackend, VisionStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ClaudeVision,
    OpenRouterVision,
    OcrFree,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::ClaudeVision => "claude_vision",
            Mode::OpenRouterVision => "openrouter_vision",
            Mode::OcrFree => "ocr_free",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "claude_vision" | "claude" => Ok(Mode::ClaudeVision),
            "openrouter_vision" | "openrouter" => Ok(Mode::OpenRouterVision),
            "ocr_free" | "ocr" => Ok(Mode::OcrFree),
            other => Err(anyhow!(
                "unknown mode '{}' (expected claude_vision, openrouter_vision or ocr_free)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMethod {
    ClaudeVision,
    OpenRouterVision,
    OpenRouter,
    Offline,
    Passthrough,
}

impl TranslationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            TranslationMethod::ClaudeVision => "claude_vision",
            TranslationMethod::OpenRouterVision => "openrouter_vision",
            TranslationMethod::OpenRouter => "openrouter",
            TranslationMethod::Offline => "offline",
            TranslationMethod::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub document: StructuredDocument,
    pub usage: Usage,
    pub method: TranslationMethod,
    pub model_name: String,
    pub fallback_errors: Vec<String>,
}

impl Translation {
    pub fn fallback_note(&self) -> Option<String> {
        if self.fallback_errors.is_empty() {
            None
        } else {
            Some(self.fallback_errors.join("; "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlideInput {
    pub slide_number: usize,
    pub image: Arc<DynamicImage>,
    pub cancel: CancelToken,
}

#[derive(Clone)]
pub struct Backends {
    pub transport: Arc<dyn HttpTransport>,
    pub ocr: Arc<dyn OcrEngine>,
    pub offline: Arc<EngineCache>,
    pub pool: WorkerPool,
}

impl Backends {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = ReqwestTransport::new(settings.request_timeout())?;
        let ocr = TesseractEngine::new(settings.tesseract.clone(), settings.ocr_psm, settings.ocr_oem);
        let factory = CommandEngineFactory::new(settings.offline_command.clone());
        Ok(Self {
            transport: Arc::new(transport),
            ocr: Arc::new(ocr),
            offline: Arc::new(EngineCache::new(
                Arc::new(factory),
                settings.offline_cache_capacity,
            )),
            pool: WorkerPool::new(settings.workers),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub mode: Mode,
    pub pair: LanguagePair,
    pub claude_key: Option<String>,
    pub openrouter_key: Option<String>,
    pub claude_model: String,
    pub vision_model: String,
    pub text_model: String,
    pub claude_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,
    pub retry: RetryPolicy,
    pub ocr_min_width: u32,
}

impl ChainConfig {
    pub fn from_settings(settings: &Settings, mode: Mode, pair: LanguagePair) -> Self {
        Self {
            mode,
            pair,
            claude_key: settings.claude_api_key.clone(),
            openrouter_key: settings.openrouter_api_key.clone(),
            claude_model: settings.claude_model.clone(),
            vision_model: settings.openrouter_vision_model.clone(),
            text_model: settings.openrouter_text_model.clone(),
            claude_base_url: settings.claude_base_url.clone(),
            openrouter_base_url: settings.openrouter_base_url.clone(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                backoff_unit: settings.retry_backoff(),
            },
            ocr_min_width: settings.ocr_min_width,
        }
    }

    // The override lands on the model the mode talks to first.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        let Some(model) = model.filter(|model| !model.trim().is_empty()) else {
            return self;
        };
        match self.mode {
            Mode::ClaudeVision => self.claude_model = model,
            Mode::OpenRouterVision => self.vision_model = model,
            Mode::OcrFree => self.text_model = model,
        }
        self
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        let Some(key) = key.filter(|key| !key.trim().is_empty()) else {
            return self;
        };
        match self.mode {
            Mode::ClaudeVision => self.claude_key = Some(key),
            Mode::OpenRouterVision | Mode::OcrFree => self.openrouter_key = Some(key),
        }
        self
    }

    pub fn primary_model(&self) -> &str {
        match self.mode {
            Mode::ClaudeVision => &self.claude_model,
            Mode::OpenRouterVision => &self.vision_model,
            Mode::OcrFree => &self.text_model,
        }
    }

    fn openrouter(&self, transport: Arc<dyn HttpTransport>, key: Option<String>) -> OpenRouter {
        OpenRouter::new(transport, key)
            .with_base_url(self.openrouter_base_url.clone())
            .with_retry(self.retry)
    }

    fn ocr_chain(
        &self,
        backends: &Backends,
        text_key: Option<String>,
    ) -> Result<OcrChainStrategy> {
        let text_client = self
            .openrouter(backends.transport.clone(), text_key)
            .with_model(self.text_model.clone());
        let system_prompt = render_text_system_prompt(&self.pair)?;
        Ok(OcrChainStrategy::new(
            backends.ocr.clone(),
            backends.offline.clone(),
            backends.pool.clone(),
            self.pair.clone(),
            self.ocr_min_width,
        )
        .with_text_llm(text_client, system_prompt))
    }
}

pub type SlideChain = FallbackChain<SlideInput, Translation>;

pub fn build_chain(config: &ChainConfig, backends: &Backends) -> Result<SlideChain> {
    let prompt = render_vision_prompt(&config.pair)?;
    let compact_prompt = render_compact_vision_prompt(&config.pair)?;
    let chain = match config.mode {
        Mode::ClaudeVision => {
            let claude = Claude::new(
                backends.transport.clone(),
                config.claude_key.clone().unwrap_or_default(),
            )
            .with_model(config.claude_model.clone())
            .with_base_url(config.claude_base_url.clone())
            .with_retry(config.retry);
            FallbackChain::new(config.mode.as_str()).with(VisionStrategy::new(
                Arc::new(claude),
                backends.pool.clone(),
                prompt,
                compact_prompt,
            ))
        }
        Mode::OpenRouterVision => {
            let client = config
                .openrouter(backends.transport.clone(), config.openrouter_key.clone())
                .with_model(config.vision_model.clone());
            // The key is withheld from the fallback so it goes straight to offline MT.
            FallbackChain::new(config.mode.as_str())
                .with(VisionStrategy::new(
                    Arc::new(client),
                    backends.pool.clone(),
                    prompt,
                    compact_prompt,
                ))
                .with(config.ocr_chain(backends, None)?)
        }
        Mode::OcrFree => FallbackChain::new(config.mode.as_str())
            .with(config.ocr_chain(backends, config.openrouter_key.clone())?),
    };
    Ok(chain)
}

pub async fn translate_slide(
    chain: &SlideChain,
    input: &SlideInput,
) -> Result<Translation, StageError> {
    let outcome = chain.run(input, &input.cancel).await?;
    let mut translation = outcome.value;
    let mut notes: Vec<String> = outcome
        .failures
        .iter()
        .map(|failure| format!("{}: {}", failure.stage, failure.error))
        .collect();
    notes.append(&mut translation.fallback_errors);
    translation.fallback_errors = notes;
    Ok(translation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_cli_names() {
        assert_eq!("claude_vision".parse::<Mode>().expect("mode"), Mode::ClaudeVision);
        assert_eq!("openrouter-vision".parse::<Mode>().expect("mode"), Mode::OpenRouterVision);
        assert_eq!("OCR_FREE".parse::<Mode>().expect("mode"), Mode::OcrFree);
        assert!("gpt".parse::<Mode>().is_err());
        assert_eq!(Mode::OcrFree.to_string(), "ocr_free");
    }

    #[test]
    fn overrides_target_the_primary_model_and_key() {
        let settings = Settings::default();
        let config = ChainConfig::from_settings(&settings, Mode::OcrFree, LanguagePair::new("es", "en"))
            .with_model(Some("meta/llama".to_string()))
            .with_key(Some("or-key".to_string()));
        assert_eq!(config.text_model, "meta/llama");
        assert_eq!(config.primary_model(), "meta/llama");
        assert_eq!(config.vision_model, settings.openrouter_vision_model);
        assert_eq!(config.openrouter_key.as_deref(), Some("or-key"));

        let config = ChainConfig::from_settings(&settings, Mode::ClaudeVision, LanguagePair::new("es", "en"))
            .with_model(Some(" ".to_string()))
            .with_key(Some("sk".to_string()));
        assert_eq!(config.claude_model, settings.claude_model);
        assert_eq!(config.claude_key.as_deref(), Some("sk"));
    }

    #[test]
    fn fallback_note_joins_errors() {
        let translation = Translation {
            document: StructuredDocument::from_plain_text("hello"),
            usage: Usage::default(),
            method: TranslationMethod::Offline,
            model_name: "opus-mt-es-en".to_string(),
            fallback_errors: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(translation.fallback_note().as_deref(), Some("a; b"));
        assert_eq!(TranslationMethod::OpenRouterVision.as_str(), "openrouter_vision");
    }
}
