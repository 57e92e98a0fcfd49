use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

mod claude;
mod offline;
mod openrouter;
mod retry;
mod transport;

pub use claude::{Claude, DEFAULT_MODEL as CLAUDE_DEFAULT_MODEL};
pub use offline::{
    CommandEngine, CommandEngineFactory, EngineCache, EngineFactory, OfflineEngine,
    translate_lines,
};
pub use openrouter::{
    DEFAULT_TEXT_MODEL as OPENROUTER_DEFAULT_TEXT_MODEL,
    DEFAULT_VISION_MODEL as OPENROUTER_DEFAULT_VISION_MODEL, OpenRouter,
};
pub use retry::{RetryPolicy, send_with_retry};
pub use transport::{HttpReply, HttpRequest, HttpTransport, ReqwestTransport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

pub(crate) fn png_base64(png: &[u8]) -> String {
    BASE64.encode(png)
}

fn non_empty(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
