use anyhow::{Context, Result};
use tera::{Context as TeraContext, Tera};

use crate::document::SIZE_STEPS;

const VISION_TEMPLATE: &str = include_str!("vision.tera");
const VISION_COMPACT_TEMPLATE: &str = include_str!("vision_compact.tera");
const TEXT_SYSTEM_TEMPLATE: &str = include_str!("text_system.tera");

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("it", "Italian"),
    ("de", "German"),
    ("pt", "Portuguese"),
];

const COLOR_NAMES: &[&str] = &["black", "blue", "green", "red", "orange", "grey"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: normalize_code(&source.into()),
            target: normalize_code(&target.into()),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    pub fn key(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

pub fn language_name(code: &str) -> String {
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code.trim()))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.trim().to_string())
}

fn pair_context(pair: &LanguagePair) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("source_name", &language_name(&pair.source));
    context.insert("target_name", &language_name(&pair.target));
    context.insert("colors", &COLOR_NAMES.join(", "));
    let sizes = SIZE_STEPS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    context.insert("sizes", &sizes);
    context
}

pub fn render_vision_prompt(pair: &LanguagePair) -> Result<String> {
    Tera::one_off(VISION_TEMPLATE, &pair_context(pair), false)
        .with_context(|| "failed to render vision prompt")
}

pub fn render_compact_vision_prompt(pair: &LanguagePair) -> Result<String> {
    Tera::one_off(VISION_COMPACT_TEMPLATE, &pair_context(pair), false)
        .with_context(|| "failed to render compact vision prompt")
}

pub fn render_text_system_prompt(pair: &LanguagePair) -> Result<String> {
    Tera::one_off(TEXT_SYSTEM_TEMPLATE, &pair_context(pair), false)
        .with_context(|| "failed to render text translation prompt")
}
