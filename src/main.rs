use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use slide_translator::{
    CancelToken, Config, Mode, PipelineError, ProgressEvent, SlideSelection, format_stats,
};

#[derive(Parser, Debug)]
#[command(
    name = "slide-translator",
    version,
    about = "Translate the text in slide images and place it beside each image"
)]
struct Cli {
    /// Presentation to translate (.pptx)
    input: PathBuf,

    /// Where to write the translated presentation
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Translation mode (claude_vision, openrouter_vision, ocr_free)
    #[arg(long = "mode", default_value = "claude_vision")]
    mode: Mode,

    /// Slides to translate, 1-based (e.g. 1,3-5). Default: all
    #[arg(long = "slides", default_value = "all")]
    slides: SlideSelection,

    /// Source language (ISO 639-1). Default: from settings
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Target language (ISO 639-1). Default: from settings
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Model for the selected mode
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key for the selected mode (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Write run statistics as JSON to this path
    #[arg(long = "stats")]
    stats: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn print_progress(event: &ProgressEvent) {
    let phase = event
        .phase
        .map(|phase| format!(" [{}]", phase.as_str()))
        .unwrap_or_default();
    let error = event
        .error
        .as_deref()
        .map(|error| format!(": {}", error))
        .unwrap_or_default();
    eprintln!(
        "[{}/{}] slide {}/{} {}{}{}",
        event.current,
        event.total,
        event.slide_index,
        event.slide_total,
        event.status.as_str(),
        phase,
        error
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    slide_translator::logging::init(cli.verbose)?;

    let input = fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling after the current step...");
            signal_token.cancel();
        }
    });

    let config = Config {
        mode: cli.mode,
        lang: cli.lang,
        source_lang: cli.source_lang,
        model: cli.model,
        key: cli.key,
        slides: cli.slides,
        settings_path: cli.read_settings,
    };

    let output = match slide_translator::run(config, &input, &print_progress, &cancel).await {
        Ok(output) => output,
        Err(err) => {
            if let Some(pipeline_err) = err.downcast_ref::<PipelineError>()
                && pipeline_err.is_cancelled()
            {
                eprintln!("translation cancelled; no output written");
                std::process::exit(130);
            }
            return Err(err);
        }
    };

    fs::write(&cli.output, &output.document)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    if let Some(path) = cli.stats.as_ref() {
        let json = serde_json::to_string_pretty(&output.stats)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!("{}", format_stats(&output.stats));

    if output.all_failed() {
        return Err(anyhow!("every selected slide failed to translate"));
    }
    Ok(())
}
