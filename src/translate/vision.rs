use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{SlideInput, Translation, TranslationMethod};
use crate::chain::Strategy;
use crate::encode::vision_png;
use crate::error::{ProviderError, StageError};
use crate::pool::WorkerPool;
use crate::providers::{ChatReply, Claude, OpenRouter, Usage};
use crate::repair::parse_document;

#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn method(&self) -> TranslationMethod;
    fn provider(&self) -> &str;
    async fn vision(&self, png: &[u8], prompt: &str) -> Result<ChatReply, ProviderError>;
}

#[async_trait]
impl VisionBackend for Claude {
    fn method(&self) -> TranslationMethod {
        TranslationMethod::ClaudeVision
    }

    fn provider(&self) -> &str {
        self.provider_name()
    }

    async fn vision(&self, png: &[u8], prompt: &str) -> Result<ChatReply, ProviderError> {
        Claude::vision(self, png, prompt).await
    }
}

#[async_trait]
impl VisionBackend for OpenRouter {
    fn method(&self) -> TranslationMethod {
        TranslationMethod::OpenRouterVision
    }

    fn provider(&self) -> &str {
        self.provider_name()
    }

    async fn vision(&self, png: &[u8], prompt: &str) -> Result<ChatReply, ProviderError> {
        OpenRouter::vision(self, png, prompt).await
    }
}

pub struct VisionStrategy {
    backend: Arc<dyn VisionBackend>,
    pool: WorkerPool,
    prompt: String,
    compact_prompt: String,
}

impl VisionStrategy {
    pub fn new(
        backend: Arc<dyn VisionBackend>,
        pool: WorkerPool,
        prompt: String,
        compact_prompt: String,
    ) -> Self {
        Self {
            backend,
            pool,
            prompt,
            compact_prompt,
        }
    }

    async fn call(&self, png: Arc<Vec<u8>>, prompt: &str) -> Result<ChatReply, ProviderError> {
        let backend = self.backend.clone();
        let prompt = prompt.to_string();
        self.pool
            .run(async move { backend.vision(&png, &prompt).await })
            .await?
    }

    fn malformed(&self, detail: String) -> ProviderError {
        ProviderError::MalformedResponse {
            provider: self.backend.provider().to_string(),
            detail,
        }
    }
}

#[async_trait]
impl Strategy<SlideInput, Translation> for VisionStrategy {
    fn name(&self) -> &str {
        self.backend.method().as_str()
    }

    async fn attempt(&self, input: &SlideInput) -> Result<Translation, StageError> {
        let image = input.image.clone();
        let png = self
            .pool
            .run_blocking(move || vision_png(&image))
            .await?
            .map_err(|err| ProviderError::Worker(format!("failed to encode slide image: {err}")))?;
        let png = Arc::new(png);

        input.cancel.checkpoint()?;
        let reply = self.call(png.clone(), &self.prompt).await?;
        input.cancel.checkpoint()?;

        let mut usage = reply.usage;
        let mut model = reply.model.clone();
        let parsed = match parse_document(&reply.text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    "slide {}: {} response unparseable ({}); retrying with compact prompt",
                    input.slide_number,
                    self.backend.provider(),
                    err
                );
                let retry = self.call(png, &self.compact_prompt).await?;
                input.cancel.checkpoint()?;
                usage.add(retry.usage);
                model = retry.model.clone();
                parse_document(&retry.text).map_err(|err| self.malformed(err.to_string()))?
            }
        };
        if parsed.repaired {
            info!(
                "slide {}: repaired truncated {} response",
                input.slide_number,
                self.backend.provider()
            );
        }
        if parsed.document.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.backend.provider().to_string(),
            }
            .into());
        }
        Ok(Translation {
            document: parsed.document,
            usage,
            method: self.backend.method(),
            model_name: model,
            fallback_errors: Vec::new(),
        })
    }
}
