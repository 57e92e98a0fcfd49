use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::retry::{RetryPolicy, send_with_retry};
use super::transport::{HttpRequest, HttpTransport};
use super::{ChatReply, Usage, non_empty, png_base64};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const PROVIDER: &str = "OpenRouter";
pub const DEFAULT_VISION_MODEL: &str = "google/gemma-3-12b-it:free";
pub const DEFAULT_TEXT_MODEL: &str = "openrouter/free";
pub const TEXT_MAX_TOKENS: u32 = 3000;
pub const TEXT_TEMPERATURE: f32 = 0.1;

#[derive(Clone)]
pub struct OpenRouter {
    transport: Arc<dyn HttpTransport>,
    key: Option<String>,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenRouter {
    pub fn new(transport: Arc<dyn HttpTransport>, key: Option<String>) -> Self {
        Self {
            transport,
            key: key.filter(|key| !key.trim().is_empty()),
            model: DEFAULT_VISION_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url
            && !url.trim().is_empty()
        {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    pub async fn vision(&self, png: &[u8], prompt: &str) -> Result<ChatReply, ProviderError> {
        let messages = json!([
            {
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/png;base64,{}", png_base64(png))}
                    },
                    {"type": "text", "text": prompt}
                ]
            }
        ]);
        let body = json!({
            "model": self.model,
            "messages": messages,
        });
        self.complete(body).await
    }

    // Gemma models reject the system role, so the prompt rides in the user turn.
    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatReply, ProviderError> {
        let messages = if self.model.to_lowercase().contains("gemma") {
            json!([
                {"role": "user", "content": format!("{system}\n\nText to translate:\n{user}")}
            ])
        } else {
            json!([
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ])
        };
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": TEXT_MAX_TOKENS,
            "temperature": TEXT_TEMPERATURE,
        });
        self.complete(body).await
    }

    async fn complete(&self, body: Value) -> Result<ChatReply, ProviderError> {
        let Some(key) = self.key.as_deref() else {
            return Err(ProviderError::MissingKey {
                provider: PROVIDER.to_string(),
            });
        };
        let request = HttpRequest {
            provider: PROVIDER.to_string(),
            url: format!("{}/chat/completions", self.base_url),
            headers: vec![("Authorization".to_string(), format!("Bearer {key}"))],
            body,
        };
        let reply = send_with_retry(self.transport.as_ref(), &request, self.retry).await?;
        extract_chat_response(&reply.body, &self.model)
    }
}

fn extract_chat_response(text: &str, fallback_model: &str) -> Result<ChatReply, ProviderError> {
    let payload: ChatResponse =
        serde_json::from_str(text).map_err(|err| ProviderError::MalformedResponse {
            provider: PROVIDER.to_string(),
            detail: format!("failed to parse OpenRouter response JSON: {}", err),
        })?;
    if let Some(error) = payload.error {
        return Err(ProviderError::Http {
            provider: PROVIDER.to_string(),
            status: error.code.as_ref().and_then(Value::as_u64).unwrap_or(0) as u16,
            message: error.message.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: PROVIDER.to_string(),
        });
    }
    let usage = payload
        .usage
        .map(|usage| Usage {
            input_tokens: usage.prompt_tokens.or(usage.input_tokens).unwrap_or(0),
            output_tokens: usage.completion_tokens.or(usage.output_tokens).unwrap_or(0),
        })
        .unwrap_or_default();
    Ok(ChatReply {
        text: content,
        model: non_empty(payload.model, fallback_model),
        usage,
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: Option<String>,
    code: Option<Value>,
}
