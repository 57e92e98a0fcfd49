use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cost::ModelPrice;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub base_font_size: f32,
    pub claude_model: String,
    pub openrouter_vision_model: String,
    pub openrouter_text_model: String,
    pub claude_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub claude_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_ms: u64,
    pub font_family: String,
    pub line_spacing: f32,
    pub min_font_size: f32,
    pub max_fit_iterations: usize,
    pub text_margin_inches: f64,
    pub tesseract: String,
    pub ocr_psm: u32,
    pub ocr_oem: u32,
    pub ocr_min_width: u32,
    pub offline_command: String,
    pub offline_cache_capacity: usize,
    pub workers: usize,
    pub prices: HashMap<String, ModelPrice>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "es".to_string(),
            target_lang: "en".to_string(),
            base_font_size: 11.0,
            claude_model: "claude-sonnet-4-20250514".to_string(),
            openrouter_vision_model: "google/gemma-3-12b-it:free".to_string(),
            openrouter_text_model: "openrouter/free".to_string(),
            claude_api_key: None,
            openrouter_api_key: None,
            claude_base_url: None,
            openrouter_base_url: None,
            timeout_secs: 60,
            max_retries: 3,
            backoff_ms: 1000,
            font_family: "Calibri".to_string(),
            line_spacing: 1.15,
            min_font_size: 6.0,
            max_fit_iterations: 20,
            text_margin_inches: 0.2,
            tesseract: "tesseract".to_string(),
            ocr_psm: 3,
            ocr_oem: 3,
            ocr_min_width: 1200,
            offline_command: "argos-translate".to_string(),
            offline_cache_capacity: 16,
            workers: 4,
            prices: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translation: Option<TranslationSettings>,
    providers: Option<ProviderSettings>,
    render: Option<RenderSettings>,
    ocr: Option<OcrSettings>,
    offline: Option<OfflineSettings>,
    pipeline: Option<PipelineSettings>,
    prices: Option<HashMap<String, PriceEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
    base_font_size: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSettings {
    claude_model: Option<String>,
    openrouter_vision_model: Option<String>,
    openrouter_text_model: Option<String>,
    claude_api_key: Option<String>,
    openrouter_api_key: Option<String>,
    claude_base_url: Option<String>,
    openrouter_base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<usize>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_family: Option<String>,
    line_spacing: Option<f32>,
    min_font_size: Option<f32>,
    max_fit_iterations: Option<usize>,
    text_margin_inches: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    tesseract: Option<String>,
    psm: Option<u32>,
    oem: Option<u32>,
    min_width: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OfflineSettings {
    command: Option<String>,
    cache_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    workers: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    input: f64,
    output: f64,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    settings.apply_env();
    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translation) = incoming.translation {
            set_text(&mut self.source_lang, translation.source_lang);
            set_text(&mut self.target_lang, translation.target_lang);
            if let Some(size) = translation.base_font_size
                && size > 0.0
            {
                self.base_font_size = size;
            }
        }
        if let Some(providers) = incoming.providers {
            set_text(&mut self.claude_model, providers.claude_model);
            set_text(
                &mut self.openrouter_vision_model,
                providers.openrouter_vision_model,
            );
            set_text(
                &mut self.openrouter_text_model,
                providers.openrouter_text_model,
            );
            set_optional(&mut self.claude_api_key, providers.claude_api_key);
            set_optional(&mut self.openrouter_api_key, providers.openrouter_api_key);
            set_optional(&mut self.claude_base_url, providers.claude_base_url);
            set_optional(&mut self.openrouter_base_url, providers.openrouter_base_url);
            if let Some(secs) = providers.timeout_secs
                && secs > 0
            {
                self.timeout_secs = secs;
            }
            if let Some(retries) = providers.max_retries {
                self.max_retries = retries;
            }
            if let Some(backoff) = providers.backoff_ms {
                self.backoff_ms = backoff;
            }
        }
        if let Some(render) = incoming.render {
            set_text(&mut self.font_family, render.font_family);
            if let Some(spacing) = render.line_spacing
                && spacing > 0.0
            {
                self.line_spacing = spacing;
            }
            if let Some(size) = render.min_font_size
                && size > 0.0
            {
                self.min_font_size = size;
            }
            if let Some(limit) = render.max_fit_iterations {
                self.max_fit_iterations = limit;
            }
            if let Some(margin) = render.text_margin_inches
                && margin >= 0.0
            {
                self.text_margin_inches = margin;
            }
        }
        if let Some(ocr) = incoming.ocr {
            set_text(&mut self.tesseract, ocr.tesseract);
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
            if let Some(oem) = ocr.oem {
                self.ocr_oem = oem;
            }
            if let Some(width) = ocr.min_width {
                self.ocr_min_width = width;
            }
        }
        if let Some(offline) = incoming.offline {
            set_text(&mut self.offline_command, offline.command);
            if let Some(capacity) = offline.cache_capacity
                && capacity > 0
            {
                self.offline_cache_capacity = capacity;
            }
        }
        if let Some(pipeline) = incoming.pipeline
            && let Some(workers) = pipeline.workers
            && workers > 0
        {
            self.workers = workers;
        }
        if let Some(prices) = incoming.prices {
            for (model, entry) in prices {
                self.prices.insert(
                    model,
                    ModelPrice {
                        input_per_million: entry.input,
                        output_per_million: entry.output,
                    },
                );
            }
        }
    }

    fn apply_env(&mut self) {
        if self.claude_api_key.is_none() {
            self.claude_api_key = get_env("ANTHROPIC_API_KEY").or_else(|| get_env("CLAUDE_API_KEY"));
        }
        if self.openrouter_api_key.is_none() {
            self.openrouter_api_key = get_env("OPENROUTER_API_KEY");
        }
        if self.claude_base_url.is_none() {
            self.claude_base_url = get_env("ANTHROPIC_BASE_URL");
        }
        if self.openrouter_base_url.is_none() {
            self.openrouter_base_url = get_env("OPENROUTER_BASE_URL");
        }
    }
}

fn set_text(target: &mut String, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = value.trim().to_string();
    }
}

fn set_optional(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = Some(value.trim().to_string());
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".slide-translator"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_match_struct_defaults() {
        let mut settings = Settings::default();
        settings.merge_str(DEFAULT_SETTINGS_TOML).expect("parse");
        let defaults = Settings::default();
        assert_eq!(settings.claude_model, defaults.claude_model);
        assert_eq!(settings.openrouter_vision_model, defaults.openrouter_vision_model);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.max_fit_iterations, 20);
        assert!((settings.min_font_size - 6.0).abs() < f32::EPSILON);
    }

    #[test]
    fn later_files_override_earlier_values() {
        let mut settings = Settings::default();
        settings
            .merge_str("[translation]\ntarget_lang = \"fr\"\n[pipeline]\nworkers = 2\n")
            .expect("parse");
        settings
            .merge_str("[translation]\ntarget_lang = \"it\"\n[pipeline]\nworkers = 0\n")
            .expect("parse");
        assert_eq!(settings.target_lang, "it");
        assert_eq!(settings.workers, 2);
    }

    #[test]
    fn prices_section_adds_models() {
        let mut settings = Settings::default();
        settings
            .merge_str("[prices.\"vendor/model\"]\ninput = 0.5\noutput = 1.5\n")
            .expect("parse");
        let price = settings.prices.get("vendor/model").expect("price");
        assert!((price.output_per_million - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn load_writes_home_settings_and_reads_extra_file() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(&extra, "[providers]\nclaude_api_key = \"from-file\"\n").expect("write");
            let settings = load_settings(Some(&extra)).expect("load");
            assert_eq!(settings.claude_api_key.as_deref(), Some("from-file"));
            assert!(home.join(".slide-translator").join("settings.toml").exists());
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let missing = home.join("nope.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }
}
