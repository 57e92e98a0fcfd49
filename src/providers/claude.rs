use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::retry::{RetryPolicy, send_with_retry};
use super::transport::{HttpRequest, HttpTransport};
use super::{ChatReply, Usage, non_empty, png_base64};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "Claude";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const MAX_TOKENS: u32 = 8192;

#[derive(Clone)]
pub struct Claude {
    transport: Arc<dyn HttpTransport>,
    key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl Claude {
    pub fn new(transport: Arc<dyn HttpTransport>, key: impl Into<String>) -> Self {
        Self {
            transport,
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
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
            self.base_url = url;
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    pub async fn vision(&self, png: &[u8], prompt: &str) -> Result<ChatReply, ProviderError> {
        if self.key.trim().is_empty() {
            return Err(ProviderError::MissingKey {
                provider: PROVIDER.to_string(),
            });
        }
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": "image/png",
                                "data": png_base64(png)
                            }
                        },
                        {"type": "text", "text": prompt}
                    ]
                }
            ]
        });
        let request = HttpRequest {
            provider: PROVIDER.to_string(),
            url: self.base_url.clone(),
            headers: vec![
                ("x-api-key".to_string(), self.key.clone()),
                ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
            ],
            body,
        };
        let reply = send_with_retry(self.transport.as_ref(), &request, self.retry).await?;
        extract_text_response(&reply.body, &self.model)
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ChatReply, ProviderError> {
    let payload: ClaudeResponse =
        serde_json::from_str(text).map_err(|err| ProviderError::MalformedResponse {
            provider: PROVIDER.to_string(),
            detail: format!("failed to parse Claude response JSON: {}", err),
        })?;
    let text = payload
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: PROVIDER.to_string(),
        });
    }
    let usage = payload
        .usage
        .map(|usage| Usage {
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
        })
        .unwrap_or_default();
    Ok(ChatReply {
        text,
        model: non_empty(payload.model, fallback_model),
        usage,
    })
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
    model: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
