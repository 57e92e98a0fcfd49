use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Invalid API key for {provider}. Check the key in your settings.")]
    Auth { provider: String },

    #[error("Insufficient credits on the {provider} account. Top up your account and retry.")]
    Quota { provider: String },

    #[error("Rate limit reached for {provider}. Retry later.")]
    RateLimited { provider: String },

    #[error("{provider} is temporarily overloaded. Retry in a few minutes.")]
    Overloaded { provider: String },

    #[error("Cannot reach {provider}: {detail}")]
    Connection { provider: String, detail: String },

    #[error("{provider} did not answer within {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider} returned an unparseable response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("No API key configured for {provider}")]
    MissingKey { provider: String },

    #[error("{provider} API error ({status}): {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR produced no text")]
    EmptyOcr,

    #[error("offline translation failed: {0}")]
    OfflineMt(String),

    #[error("worker pool error: {0}")]
    Worker(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Auth { .. } | ProviderError::MissingKey { .. } => "auth",
            ProviderError::Quota { .. } => "quota",
            ProviderError::RateLimited { .. } => "rate_limit",
            ProviderError::Overloaded { .. } => "overloaded",
            ProviderError::Connection { .. } | ProviderError::Timeout { .. } => "connection",
            ProviderError::MalformedResponse { .. } => "malformed_response",
            ProviderError::EmptyResponse { .. } | ProviderError::EmptyOcr => "empty_response",
            ProviderError::Http { .. } | ProviderError::Worker(_) => "unknown",
            ProviderError::Ocr(_) => "ocr",
            ProviderError::OfflineMt(_) => "offline_mt",
        }
    }
}

pub fn classify_http(provider: &str, status: u16, body: &str) -> ProviderError {
    let lower = body.to_lowercase();
    let provider = provider.to_string();
    if status == 402 || lower.contains("credit balance") || lower.contains("insufficient credits")
    {
        return ProviderError::Quota { provider };
    }
    if status == 401
        || status == 403
        || lower.contains("invalid_api_key")
        || lower.contains("authentication_error")
        || lower.contains("invalid x-api-key")
    {
        return ProviderError::Auth { provider };
    }
    if status == 429 || lower.contains("rate_limit") {
        return ProviderError::RateLimited { provider };
    }
    if status == 529 || status == 503 || lower.contains("overloaded") {
        return ProviderError::Overloaded { provider };
    }
    ProviderError::Http {
        provider,
        status,
        message: error_message(body).chars().take(300).collect(),
    }
}

fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("error"))
                .or_else(|| value.get("message"))
        })
        .and_then(|value| value.as_str())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("translation cancelled by user")]
pub struct Cancelled;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("invalid presentation: {0:#}")]
    InvalidDocument(anyhow::Error),
    #[error("failed to write presentation: {0:#}")]
    Output(anyhow::Error),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }
}
