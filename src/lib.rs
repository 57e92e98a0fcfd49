use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub mod cancel;
pub mod chain;
pub mod cost;
pub mod deck;
pub mod document;
pub mod encode;
pub mod error;
pub mod locate;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod render;
pub mod repair;
pub mod settings;
pub mod translate;

#[cfg(test)]
mod test_util;

pub use cancel::CancelToken;
pub use error::{Cancelled, PipelineError, ProviderError};
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats, SlideRecord, SlideSelection};
pub use progress::{NoopProgress, ProgressEvent, ProgressSink, SlideStatus};
pub use prompts::LanguagePair;
pub use translate::{Backends, ChainConfig, Mode};

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub lang: Option<String>,
    pub source_lang: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub slides: SlideSelection,
    pub settings_path: Option<String>,
}

pub async fn run(
    config: Config,
    input: &[u8],
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<PipelineOutput> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let pair = LanguagePair::new(
        config
            .source_lang
            .unwrap_or_else(|| settings.source_lang.clone()),
        config.lang.unwrap_or_else(|| settings.target_lang.clone()),
    );
    validate_pair(&pair)?;

    let chain_config = ChainConfig::from_settings(&settings, config.mode, pair)
        .with_model(config.model)
        .with_key(config.key);
    if config.mode == Mode::ClaudeVision && chain_config.claude_key.is_none() {
        return Err(anyhow!(
            "no API key found for Claude (set ANTHROPIC_API_KEY or pass --key)"
        ));
    }
    if config.mode == Mode::OpenRouterVision && chain_config.openrouter_key.is_none() {
        return Err(anyhow!(
            "no API key found for OpenRouter (set OPENROUTER_API_KEY or pass --key)"
        ));
    }

    let backends = Backends::from_settings(&settings)?;
    let pipeline = Pipeline::new(&chain_config, &backends, &settings)
        .with_context(|| "failed to build translation chain")?;
    let output = pipeline
        .run(input, &config.slides, progress, cancel)
        .await?;
    Ok(output)
}

fn validate_pair(pair: &LanguagePair) -> Result<()> {
    for code in [&pair.source, &pair.target] {
        if code.is_empty() || code == "auto" {
            return Err(anyhow!(
                "language codes must be explicit (got '{}' for {})",
                code,
                pair.key()
            ));
        }
        if !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(anyhow!("invalid language code: {}", code));
        }
    }
    Ok(())
}

pub fn format_stats(stats: &PipelineStats) -> String {
    let mut lines = vec![format!(
        "slides: {} processed, {} failed, {} skipped of {}",
        stats.processed_slides, stats.failed_slides, stats.skipped_slides, stats.total_slides
    )];
    let methods = stats.method_counts();
    if !methods.is_empty() {
        let methods = methods
            .iter()
            .map(|(method, count)| format!("{}={}", method, count))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("methods: {}", methods));
    }
    lines.push(format!(
        "tokens: input={} output={} cost=${:.4}",
        stats.total_input_tokens, stats.total_output_tokens, stats.total_cost
    ));
    lines.extend(stats.warnings.iter().map(|warning| format!("warning: {}", warning)));
    lines.join("\n")
}
